use async_trait::async_trait;
use flightline_shared::{ClientPoints, Flight};

/// Error type surfaced by every store implementation.
pub type RepoError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for flight data access.
///
/// Plain CRUD: no call spans a transaction with any other, and concurrent
/// writers resolve as last-write-wins.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn find_flights_by_route(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<Flight>, RepoError>;

    async fn get_flight(&self, id: i64) -> Result<Option<Flight>, RepoError>;

    /// Overwrites the stored record with the same id.
    async fn save_flight(&self, flight: &Flight) -> Result<(), RepoError>;
}

/// Repository trait for loyalty balances.
#[async_trait]
pub trait PointsRepository: Send + Sync {
    async fn get_points(&self, client_id: &str) -> Result<Option<ClientPoints>, RepoError>;

    /// Inserts the record when absent, otherwise overwrites the balance.
    async fn upsert_points(&self, client_id: &str, balance: f64) -> Result<(), RepoError>;
}
