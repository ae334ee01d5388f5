//! Shared belief about whether the remote service is reachable
//!
//! Written by the health check and by the dispatcher's pessimistic
//! downgrade; last write wins.

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    pub available: bool,
    /// When the last check completed; `None` before the first one
    pub last_checked_at: Option<Instant>,
}

pub struct Availability {
    state: RwLock<AvailabilitySnapshot>,
}

impl Availability {
    /// Starts unavailable until the first check reports otherwise.
    pub fn new() -> Self {
        Self::with_initial(false)
    }

    pub fn with_initial(available: bool) -> Self {
        metrics::gauge!("backend_available").set(if available { 1.0 } else { 0.0 });
        Self {
            state: RwLock::new(AvailabilitySnapshot {
                available,
                last_checked_at: None,
            }),
        }
    }

    pub async fn is_available(&self) -> bool {
        self.state.read().await.available
    }

    pub async fn snapshot(&self) -> AvailabilitySnapshot {
        *self.state.read().await
    }

    /// Record a check result. `last_checked_at` strictly increases across
    /// checks even when two land within the clock's resolution.
    pub async fn record_check(&self, available: bool) {
        let mut state = self.state.write().await;
        let mut now = Instant::now();
        if let Some(previous) = state.last_checked_at {
            if now <= previous {
                now = previous + Duration::from_nanos(1);
            }
        }
        state.last_checked_at = Some(now);

        if state.available != available {
            info!(available, "backend availability changed");
        }
        state.available = available;
        metrics::gauge!("backend_available").set(if available { 1.0 } else { 0.0 });
    }

    /// A live call saw a network failure; assume the service is down until
    /// the next check says otherwise.
    pub async fn mark_unavailable(&self) {
        let mut state = self.state.write().await;
        if state.available {
            warn!("backend marked unavailable after network failure");
        }
        state.available = false;
        metrics::gauge!("backend_available").set(0.0);
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new()
    }
}
