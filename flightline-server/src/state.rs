use flightline_booking::{PointsLedger, ReservationEngine};
use flightline_core::{FlightRepository, IdentityScheme};
use flightline_monitor::MonitorRegistry;
use flightline_store::app_config::{Config, InvocationSemantics};
use flightline_store::Repositories;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::replay::ReplyCache;

#[derive(Clone)]
pub struct AppState {
    pub flights: Arc<dyn FlightRepository>,
    pub engine: Arc<ReservationEngine>,
    pub monitors: Arc<Mutex<MonitorRegistry>>,
    pub replies: Arc<Mutex<ReplyCache>>,
    pub identity: IdentityScheme,
    pub semantics: InvocationSemantics,
    pub max_monitor_seconds: u64,
}

impl AppState {
    pub fn new(repos: Repositories, config: &Config) -> Self {
        let ledger = PointsLedger::new(repos.points);
        let engine = ReservationEngine::new(repos.flights.clone(), ledger);

        Self {
            flights: repos.flights,
            engine: Arc::new(engine),
            monitors: Arc::new(Mutex::new(MonitorRegistry::new())),
            replies: Arc::new(Mutex::new(ReplyCache::new(
                config.invocation.reply_cache_ttl_seconds,
            ))),
            identity: config.points.key_by,
            semantics: config.invocation.semantics,
            max_monitor_seconds: config.monitor.max_duration_seconds,
        }
    }
}
