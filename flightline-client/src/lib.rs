//! Async UDP client for the flightline server.
//!
//! Request/reply operations are retransmitted with the same request id until
//! a reply arrives or the attempts run out. Monitor registration is sent once
//! and then the socket is drained for seat updates.

use flightline_proto::{CodecError, RequestMessage, ResponseMessage, MAX_DATAGRAM_LEN};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Undecodable reply: {0}")]
    Codec(#[from] CodecError),

    #[error("No reply after {attempts} attempt(s)")]
    Timeout { attempts: u32 },
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for each reply.
    pub timeout: Duration,
    /// Total sends per request, the first included.
    pub attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 3,
        }
    }
}

pub struct FlightClient {
    socket: UdpSocket,
    config: ClientConfig,
}

impl FlightClient {
    pub async fn connect(server: SocketAddr) -> ClientResult<Self> {
        Self::with_config(server, ClientConfig::default()).await
    }

    pub async fn with_config(server: SocketAddr, config: ClientConfig) -> ClientResult<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;
        Ok(Self { socket, config })
    }

    pub fn local_addr(&self) -> ClientResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn query_route(
        &self,
        source: &str,
        destination: &str,
    ) -> ClientResult<ResponseMessage> {
        self.call(RequestMessage::query_route(source, destination))
            .await
    }

    pub async fn flight_detail(&self, flight_id: i64) -> ClientResult<ResponseMessage> {
        self.call(RequestMessage::flight_detail(flight_id)).await
    }

    pub async fn reserve(&self, flight_id: i64, seats: i64) -> ClientResult<ResponseMessage> {
        self.call(RequestMessage::reserve(flight_id, seats)).await
    }

    pub async fn query_points(&self) -> ClientResult<ResponseMessage> {
        self.call(RequestMessage::query_points()).await
    }

    pub async fn reserve_with_points(
        &self,
        flight_id: i64,
        seats: i64,
    ) -> ClientResult<ResponseMessage> {
        self.call(RequestMessage::reserve_with_points(flight_id, seats))
            .await
    }

    /// Sends a request and waits for the reply carrying its opcode.
    ///
    /// A fresh request id is attached when the request has none, so every
    /// retransmission is recognisable as the same invocation.
    pub async fn call(&self, request: RequestMessage) -> ClientResult<ResponseMessage> {
        let request = if request.request_id.is_empty() {
            request.with_request_id(Uuid::new_v4().to_string())
        } else {
            request
        };
        let frame = request.encode()?;

        for attempt in 1..=self.config.attempts {
            self.socket.send(&frame).await?;
            debug!(
                "Sent opcode {} request {} (attempt {})",
                request.opcode, request.request_id, attempt
            );

            if let Some(reply) = self.await_reply(request.opcode).await? {
                return Ok(reply);
            }
            warn!(
                "No reply to request {}, attempt {} of {}",
                request.request_id, attempt, self.config.attempts
            );
        }

        Err(ClientError::Timeout {
            attempts: self.config.attempts,
        })
    }

    /// Waits one timeout period for a reply to `opcode`, skipping seat
    /// updates and stray replies meant for earlier requests.
    async fn await_reply(&self, opcode: u8) -> ClientResult<Option<ResponseMessage>> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let Some(response) = self.recv_until(deadline).await? else {
                return Ok(None);
            };
            if response.opcode == opcode {
                return Ok(Some(response));
            }
            debug!("Skipping unrelated datagram for opcode {}", response.opcode);
        }
    }

    /// Registers interest in a flight. A valid registration is not answered.
    pub async fn register_monitor(&self, flight_id: i64, duration_seconds: i64) -> ClientResult<()> {
        let frame = RequestMessage::register_monitor(flight_id, duration_seconds).encode()?;
        self.socket.send(&frame).await?;
        Ok(())
    }

    /// Waits up to `wait` for the next datagram pushed by the server.
    pub async fn next_update(&self, wait: Duration) -> ClientResult<Option<ResponseMessage>> {
        self.recv_until(Instant::now() + wait).await
    }

    /// Registers and collects every seat update until the interval ends.
    ///
    /// A failure reply to the registration is returned as the only element.
    pub async fn monitor(
        &self,
        flight_id: i64,
        duration_seconds: i64,
    ) -> ClientResult<Vec<ResponseMessage>> {
        self.register_monitor(flight_id, duration_seconds).await?;

        let deadline = Instant::now() + Duration::from_secs(duration_seconds.max(0) as u64);
        let mut updates = Vec::new();
        while let Some(response) = self.recv_until(deadline).await? {
            let rejected = !response.is_success();
            updates.push(response);
            if rejected {
                break;
            }
        }
        Ok(updates)
    }

    /// Next decodable datagram before `deadline`. Undecodable ones are
    /// logged and skipped.
    async fn recv_until(&self, deadline: Instant) -> ClientResult<Option<ResponseMessage>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match timeout(remaining, self.socket.recv(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(len)) => match ResponseMessage::decode(&buf[..len]) {
                    Ok(response) => return Ok(Some(response)),
                    Err(e) => warn!("Skipping undecodable {}-byte datagram: {}", len, e),
                },
                // An ICMP unreachable from a previous send; keep listening.
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => continue,
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}
