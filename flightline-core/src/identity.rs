use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// How a loyalty account key is derived from a datagram's source.
///
/// Clients are unauthenticated, so the key is a pseudo-account: either the
/// full `ip:port` endpoint or just the IP, which survives a client rebinding
/// to a new ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScheme {
    #[default]
    Endpoint,
    Ip,
}

impl IdentityScheme {
    pub fn client_id(&self, addr: &SocketAddr) -> String {
        match self {
            IdentityScheme::Endpoint => addr.to_string(),
            IdentityScheme::Ip => addr.ip().to_string(),
        }
    }
}
