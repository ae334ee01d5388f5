//! Process-level counters and the hard-logout watcher

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use transport::HardLogout;

/// Drain timeout after a shutdown signal
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters reported on `/health`.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub hard_logouts: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            hard_logouts: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Log and count every hard logout until the coordinator goes away.
pub fn watch_hard_logouts(
    mut events: broadcast::Receiver<HardLogout>,
    metrics: ServiceMetrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    metrics.hard_logouts.fetch_add(1, Ordering::Relaxed);
                    warn!(reason = %event.reason, "session ended, login required");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    metrics.hard_logouts.fetch_add(missed, Ordering::Relaxed);
                    warn!(missed, "hard-logout watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("hard-logout channel closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_logouts_and_exits_on_close() {
        let (tx, rx) = broadcast::channel(4);
        let metrics = ServiceMetrics::new();
        let watcher = watch_hard_logouts(rx, metrics.clone());

        tx.send(HardLogout {
            reason: "refresh rejected".into(),
        })
        .unwrap();
        tx.send(HardLogout {
            reason: "user logged out".into(),
        })
        .unwrap();
        drop(tx);

        watcher.await.unwrap();
        assert_eq!(metrics.hard_logouts.load(Ordering::Relaxed), 2);
    }
}
