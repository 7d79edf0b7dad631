use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::SocketAddr;

/// The reply produced the first time a request id was seen. Registrations
/// cache `None`, since they are never answered.
#[derive(Debug, Clone)]
pub struct CachedReply {
    pub reply: Option<Bytes>,
    pub stored_at: DateTime<Utc>,
}

/// Replies keyed by `(endpoint, request id)` for at-most-once execution.
#[derive(Debug)]
pub struct ReplyCache {
    entries: HashMap<(SocketAddr, String), CachedReply>,
    ttl: Duration,
}

impl ReplyCache {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn get(&self, src: SocketAddr, request_id: &str, now: DateTime<Utc>) -> Option<&CachedReply> {
        self.entries
            .get(&(src, request_id.to_string()))
            .filter(|entry| now - entry.stored_at < self.ttl)
    }

    pub fn insert(
        &mut self,
        src: SocketAddr,
        request_id: &str,
        reply: Option<Bytes>,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            (src, request_id.to_string()),
            CachedReply {
                reply,
                stored_at: now,
            },
        );
    }

    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.stored_at < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
