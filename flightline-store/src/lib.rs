pub mod app_config;
pub mod database;
pub mod flight_repo;
pub mod memory;
pub mod points_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use flight_repo::PostgresFlightRepository;
pub use memory::InMemoryStore;
pub use points_repo::PostgresPointsRepository;

use app_config::{StorageBackend, StorageConfig};
use flightline_core::{FlightRepository, PointsRepository, RepoError};
use flightline_shared::Flight;
use std::sync::Arc;
use tracing::{info, warn};

/// The pair of repositories the server runs against.
#[derive(Clone)]
pub struct Repositories {
    pub flights: Arc<dyn FlightRepository>,
    pub points: Arc<dyn PointsRepository>,
}

impl Repositories {
    pub fn in_memory(seed: impl IntoIterator<Item = Flight>) -> Self {
        let store = Arc::new(InMemoryStore::with_flights(seed));
        Self {
            flights: store.clone(),
            points: store,
        }
    }

    /// Opens the configured backend. Seed flights only apply to the memory store.
    pub async fn connect(config: &StorageConfig, seed: &[Flight]) -> Result<Self, RepoError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory store with {} seeded flights", seed.len());
                Ok(Self::in_memory(seed.iter().cloned()))
            }
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or("storage.database_url is required for the postgres backend")?;
                if !seed.is_empty() {
                    warn!("Ignoring {} seed flights for the postgres backend", seed.len());
                }

                let db = DbClient::new(url, config.max_connections).await?;
                db.migrate().await?;
                info!("Connected to postgres store");

                Ok(Self {
                    flights: Arc::new(PostgresFlightRepository::new(db.pool.clone())),
                    points: Arc::new(PostgresPointsRepository::new(db.pool)),
                })
            }
        }
    }
}
