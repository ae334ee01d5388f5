//! Periodic reachability check
//!
//! Spawns a task that checks the health endpoint once immediately and then
//! every `interval`, writing each result into the shared `Availability`.
//! The task is owned by a `MonitorHandle`; stopping or dropping the handle
//! ends it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::availability::Availability;

pub struct HealthMonitor {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    availability: Arc<Availability>,
}

impl HealthMonitor {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        timeout: Duration,
        availability: Arc<Availability>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            availability,
        }
    }

    pub fn availability(&self) -> &Arc<Availability> {
        &self.availability
    }

    /// Check once. Any 2xx within the timeout counts as available; every
    /// other outcome, including timeouts and refused connections, does not.
    pub async fn check(&self) -> bool {
        let available = match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(status = response.status().as_u16(), "health check answered");
                response.status().is_success()
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        };
        self.availability.record_check(available).await;
        available
    }

    /// Run `check` now and then every `interval` until the handle is stopped.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A check slower than the interval should not cause a burst.
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        self.check().await;
                    }
                }
            }
            debug!("health monitor stopped");
        });

        MonitorHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owner of the background check task.
pub struct MonitorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the check loop and wait for the task to finish. A check in
    /// progress completes first.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
