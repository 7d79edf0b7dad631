use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

/// Drops expired monitor subscriptions and stale cached replies.
///
/// Returns `(subscriptions, replies)` removed.
pub async fn sweep_once(state: &AppState) -> (usize, usize) {
    let now = Utc::now();
    let subscriptions = state.monitors.lock().await.sweep_expired(now);
    let replies = state.replies.lock().await.evict_expired(now);
    (subscriptions, replies)
}

/// Starts the periodic sweeper. An interval of zero disables it.
pub fn spawn_sweeper(state: AppState, every_seconds: u64) -> Option<JoinHandle<()>> {
    if every_seconds == 0 {
        info!("Expiry sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Expiry sweeper started, running every {}s", every_seconds);

        loop {
            ticker.tick().await;
            let (subscriptions, replies) = sweep_once(&state).await;
            if subscriptions > 0 || replies > 0 {
                debug!(
                    "Swept {} expired subscription(s) and {} cached reply(ies)",
                    subscriptions, replies
                );
            }
        }
    }))
}

/// Aborts the sweeper task when dropped.
pub struct SweeperGuard(Option<JoinHandle<()>>);

impl SweeperGuard {
    pub fn new(handle: Option<JoinHandle<()>>) -> Self {
        Self(handle)
    }
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
