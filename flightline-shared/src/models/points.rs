use serde::{Deserialize, Serialize};

/// Loyalty balance keyed by the client identity string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPoints {
    pub client_id: String,
    pub balance: f64,
}

impl ClientPoints {
    pub fn new(client_id: impl Into<String>, balance: f64) -> Self {
        Self {
            client_id: client_id.into(),
            balance,
        }
    }

    pub fn can_afford(&self, cost: f64) -> bool {
        self.balance >= cost
    }
}
