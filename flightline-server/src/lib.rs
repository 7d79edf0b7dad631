//! UDP front end for the flightline reservation service.
//!
//! One socket, one datagram per request. Datagrams are handled in arrival
//! order; replies go back to the sender and seat updates fan out to any
//! endpoint monitoring the affected flight.

pub mod dispatcher;
pub mod error;
pub mod replay;
pub mod state;
pub mod worker;

pub use dispatcher::{Dispatcher, Outbound};
pub use error::ServerError;
pub use state::AppState;

use flightline_store::{Config, Repositories};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

pub struct Server {
    socket: UdpSocket,
    dispatcher: Dispatcher,
    max_datagram_size: usize,
    sweep_interval_seconds: u64,
}

impl Server {
    pub async fn bind(config: &Config, repos: Repositories) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let socket = UdpSocket::bind(config.bind_addr()).await?;
        let state = AppState::new(repos, config);

        Ok(Self {
            socket,
            dispatcher: Dispatcher::new(state),
            max_datagram_size: config.server.max_datagram_size,
            sweep_interval_seconds: config.monitor.sweep_interval_seconds,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn state(&self) -> &AppState {
        self.dispatcher.state()
    }

    /// Serves until the task is cancelled.
    pub async fn run(self) {
        // Dropped with this future, which stops the sweeper too.
        let _sweeper = worker::SweeperGuard::new(worker::spawn_sweeper(
            self.state().clone(),
            self.sweep_interval_seconds,
        ));

        let mut buf = vec![0u8; self.max_datagram_size];
        match self.socket.local_addr() {
            Ok(addr) => info!("Listening for datagrams on {}", addr),
            Err(e) => warn!("Listening on an unknown address: {}", e),
        }

        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    // ICMP port unreachable from an earlier send surfaces here.
                    if e.kind() == io::ErrorKind::ConnectionReset {
                        continue;
                    }
                    error!("recv error: {}", e);
                    continue;
                }
            };

            let outbound = self.dispatcher.handle_datagram(&buf[..len], src).await;
            self.deliver(outbound, src).await;
        }
    }

    async fn deliver(&self, outbound: Outbound, src: SocketAddr) {
        if let Some(reply) = outbound.reply {
            if let Err(e) = self.socket.send_to(&reply, src).await {
                warn!("Failed to send reply to {}: {}", src, e);
            }
        }

        for (endpoint, frame) in outbound.notifications {
            match self.socket.send_to(&frame, endpoint).await {
                Ok(_) => debug!("Seat update sent to {}", endpoint),
                Err(e) => warn!("Failed to notify {}: {}", endpoint, e),
            }
        }
    }
}
