use async_trait::async_trait;
use flightline_core::{FlightRepository, PointsRepository, RepoError};
use flightline_shared::{ClientPoints, Flight};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Store backed by process memory. Used by default and in tests.
pub struct InMemoryStore {
    flights: RwLock<HashMap<i64, Flight>>,
    points: RwLock<HashMap<String, ClientPoints>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            flights: RwLock::new(HashMap::new()),
            points: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_flights(flights: impl IntoIterator<Item = Flight>) -> Self {
        let flights = flights.into_iter().map(|f| (f.id, f)).collect();
        Self {
            flights: RwLock::new(flights),
            points: RwLock::new(HashMap::new()),
        }
    }

    pub async fn flight_count(&self) -> usize {
        self.flights.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn find_flights_by_route(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Vec<Flight>, RepoError> {
        let flights = self.flights.read().await;
        let mut matches: Vec<Flight> = flights
            .values()
            .filter(|f| f.serves_route(source, destination))
            .cloned()
            .collect();
        matches.sort_by_key(|f| f.id);
        Ok(matches)
    }

    async fn get_flight(&self, id: i64) -> Result<Option<Flight>, RepoError> {
        Ok(self.flights.read().await.get(&id).cloned())
    }

    async fn save_flight(&self, flight: &Flight) -> Result<(), RepoError> {
        self.flights.write().await.insert(flight.id, flight.clone());
        Ok(())
    }
}

#[async_trait]
impl PointsRepository for InMemoryStore {
    async fn get_points(&self, client_id: &str) -> Result<Option<ClientPoints>, RepoError> {
        Ok(self.points.read().await.get(client_id).cloned())
    }

    async fn upsert_points(&self, client_id: &str, balance: f64) -> Result<(), RepoError> {
        self.points
            .write()
            .await
            .entry(client_id.to_string())
            .and_modify(|p| p.balance = balance)
            .or_insert_with(|| ClientPoints::new(client_id, balance));
        Ok(())
    }
}
