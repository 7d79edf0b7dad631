use serde::{Deserialize, Serialize};

/// A scheduled flight and its remaining capacity.
///
/// Records are owned by the persistence layer. Only the reservation engine
/// rewrites `seat_availability`, and it never drops below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: i64,
    pub source: String,
    pub destination: String,
    /// Carried verbatim, never parsed.
    pub departure_time: String,
    pub airfare: f64,
    pub seat_availability: i64,
}

impl Flight {
    pub fn serves_route(&self, source: &str, destination: &str) -> bool {
        self.source == source && self.destination == destination
    }

    pub fn has_seats(&self, seats: i64) -> bool {
        self.seat_availability >= seats
    }

    /// Total fare for `seats` seats.
    pub fn cost_of(&self, seats: i64) -> f64 {
        seats as f64 * self.airfare
    }
}
