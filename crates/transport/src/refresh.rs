//! Single-flight credential refresh
//!
//! At most one refresh call is in flight. Callers that hit a 401 while a
//! refresh is running are queued as waiters and settled, in arrival order,
//! with the outcome of that same refresh. The refresh itself runs on a
//! spawned task so it settles even if the caller that started it is dropped.
//!
//! State transitions:
//! - Idle → Refreshing (first caller with a stale token)
//! - Refreshing → Idle (refresh settled; waiter queue drained)

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use session::{CredentialStore, Session};
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Broadcast when the session is irrecoverably lost and the user has to log
/// in again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardLogout {
    pub reason: String,
}

type Waiter = oneshot::Sender<Result<String>>;

/// `refreshing` is true iff a refresh task is running; `waiters` is empty
/// whenever `refreshing` is false.
#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<Waiter>,
    /// Access token the last failed refresh tried to replace, with its error.
    /// Cleared by the next successful refresh.
    last_failure: Option<(String, Error)>,
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<CredentialStore>,
    client: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    logout_tx: broadcast::Sender<HardLogout>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        client: reqwest::Client,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let (logout_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(RefreshState::default()),
            store,
            client,
            refresh_url: refresh_url.into(),
            timeout,
            logout_tx,
        }
    }

    /// Subscribe to hard-logout notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HardLogout> {
        self.logout_tx.subscribe()
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub async fn is_refreshing(&self) -> bool {
        self.state.lock().await.refreshing
    }

    /// Return an access token newer than `rejected`.
    ///
    /// - A refresh is running → queue and wait for its outcome.
    /// - The stored token already differs from `rejected` (someone else
    ///   refreshed since this request was sent) → return the stored token.
    /// - Otherwise start a refresh and return its outcome.
    pub async fn obtain_fresh_token(self: &Arc<Self>, rejected: Option<&str>) -> Result<String> {
        let mut state = self.state.lock().await;

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "refresh in flight, waiting");
            drop(state);
            return rx
                .await
                .unwrap_or_else(|_| Err(Error::Network("refresh task ended unexpectedly".into())));
        }

        // Settlement writes the store before flipping `refreshing` back, so
        // holding the state lock here guarantees we see a completed refresh.
        let current = self.store.get().await;
        match (current.access_token(), rejected) {
            (Some(token), _) if Some(token) != rejected => {
                debug!("token already renewed by another caller");
                return Ok(token.to_string());
            }
            // The session ended after this request was sent: either a failed
            // refresh (hand out the same error) or an explicit logout. The
            // hard logout has already been broadcast.
            (None, Some(rejected)) => {
                debug!("session already ended, not refreshing again");
                return Err(match &state.last_failure {
                    Some((token, err)) if token == rejected => err.clone(),
                    _ => Error::LoggedOut,
                });
            }
            _ => {}
        }

        state.refreshing = true;
        drop(state);

        let coordinator = Arc::clone(self);
        let task = self.spawn_refresh(async move { coordinator.run_refresh().await });
        task.await
            .unwrap_or_else(|e| Err(Error::Network(format!("refresh task failed: {e}"))))
    }

    /// Run `work` on its own task and settle the waiters even if it panics.
    ///
    /// The supervising task is detached from the caller, so a dropped leader
    /// never leaves the coordinator stuck in Refreshing.
    fn spawn_refresh<F>(self: &Arc<Self>, work: F) -> JoinHandle<Result<String>>
    where
        F: Future<Output = Result<String>> + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::spawn(work).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "refresh task aborted");
                    let err = Error::Network(format!("refresh task failed: {e}"));
                    coordinator.settle(&Err(err.clone())).await;
                    Err(err)
                }
            }
        })
    }

    /// Clear credentials and tell subscribers the session is gone.
    pub async fn hard_logout(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.store.clear().await;
        warn!(reason = %reason, "hard logout");
        // No subscribers is fine: nobody is listening for logouts.
        let _ = self.logout_tx.send(HardLogout { reason });
    }

    async fn run_refresh(&self) -> Result<String> {
        info!("refreshing credentials");
        let session = self.store.get().await;
        let replaced = session.access_token().map(str::to_string);

        let outcome = match session.refresh_token() {
            None => Err(Error::LoggedOut),
            Some(refresh) => {
                session::refresh_session(&self.client, &self.refresh_url, refresh, self.timeout)
                    .await
                    .map_err(Error::from)
            }
        };

        match outcome {
            Ok(pair) => {
                let token = pair.token.clone();
                self.store.set(Session::from(pair)).await;
                self.state.lock().await.last_failure = None;
                let outcome = Ok(token);
                self.settle(&outcome).await;
                metrics::counter!("transport_refresh_total", "outcome" => "success").increment(1);
                info!("credential refresh succeeded");
                outcome
            }
            Err(err) => {
                metrics::counter!("transport_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %err, "credential refresh failed");
                let outcome = Err(err.clone());
                self.store.clear().await;
                self.state.lock().await.last_failure = replaced.map(|token| (token, err.clone()));
                self.settle(&outcome).await;
                let _ = self.logout_tx.send(HardLogout {
                    reason: format!("credential refresh failed: {err}"),
                });
                outcome
            }
        }
    }

    /// Return to Idle and hand `outcome` to every queued waiter in order.
    async fn settle(&self, outcome: &Result<String>) {
        let waiters = {
            let mut state = self.state.lock().await;
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), ok = outcome.is_ok(), "settling refresh waiters");
        }
        for waiter in waiters {
            // A dropped receiver means that caller went away; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
    }
}
