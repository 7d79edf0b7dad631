use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::debug;

/// A client's standing request for seat updates on one flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub flight_id: i64,
    pub endpoint: SocketAddr,
    pub expires_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Time-bounded subscribers per flight.
///
/// Registrations are never deduplicated: the same endpoint may hold several
/// overlapping subscriptions on one flight and will be notified once per
/// live subscription. Expired entries are dropped by every notification pass
/// over their flight and by `sweep_expired`.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    subscriptions: HashMap<i64, Vec<Subscription>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        flight_id: i64,
        endpoint: SocketAddr,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Subscription {
        let subscription = Subscription {
            flight_id,
            endpoint,
            expires_at: now
                .checked_add_signed(duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.subscriptions
            .entry(flight_id)
            .or_default()
            .push(subscription.clone());
        subscription
    }

    /// Endpoints to notify for `flight_id`, one per live subscription.
    ///
    /// Builds the surviving list first and swaps it in, so no entry is
    /// skipped when a neighbour expires.
    pub fn live_subscribers(&mut self, flight_id: i64, now: DateTime<Utc>) -> Vec<SocketAddr> {
        let Some(current) = self.subscriptions.remove(&flight_id) else {
            return Vec::new();
        };

        let before = current.len();
        let live: Vec<Subscription> = current.into_iter().filter(|s| s.is_live(now)).collect();
        if live.len() < before {
            debug!(
                "Dropped {} expired monitor(s) on flight {}",
                before - live.len(),
                flight_id
            );
        }

        let endpoints = live.iter().map(|s| s.endpoint).collect();
        if !live.is_empty() {
            self.subscriptions.insert(flight_id, live);
        }
        endpoints
    }

    /// Removes every expired subscription. Returns how many were dropped.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.len();
        self.subscriptions.retain(|_, subs| {
            subs.retain(|s| s.is_live(now));
            !subs.is_empty()
        });
        before - self.len()
    }

    pub fn subscriptions_for(&self, flight_id: i64) -> &[Subscription] {
        self.subscriptions
            .get(&flight_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total subscriptions held, live or not.
    pub fn len(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
