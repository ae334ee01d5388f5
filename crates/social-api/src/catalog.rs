//! Binds every `Op` to its (remote, local) implementation pair

use std::sync::Arc;

use dispatch::{Availability, Dispatcher, OperationBinding};
use serde_json::Value;
use session::{CredentialStore, Session, TokenPair};
use tracing::{info, warn};
use transport::{FailurePolicy, Result};

use crate::backend::{Op, SocialBackend, handle};

/// One binding per operation. A successful remote `login` stores the
/// returned token pair; a local login only switches the local acting user,
/// so its placeholder tokens never reach the credential store.
pub fn bindings<P, F>(
    primary: Arc<P>,
    fallback: Arc<F>,
    store: Arc<CredentialStore>,
) -> Vec<OperationBinding>
where
    P: SocialBackend,
    F: SocialBackend,
{
    Op::ALL
        .into_iter()
        .map(|op| {
            let (p, p_store) = (primary.clone(), store.clone());
            let f = fallback.clone();
            OperationBinding::new(
                op.name(),
                move |args: Value| {
                    let (backend, store) = (p.clone(), p_store.clone());
                    async move { remember_login(op, &store, handle(&*backend, op, args).await).await }
                },
                move |args: Value| {
                    let backend = f.clone();
                    async move { handle(&*backend, op, args).await }
                },
            )
        })
        .collect()
}

/// Build the dispatcher over the full catalog.
pub fn dispatcher<P, F>(
    primary: Arc<P>,
    fallback: Arc<F>,
    store: Arc<CredentialStore>,
    availability: Arc<Availability>,
    force_fallback: bool,
    policy: FailurePolicy,
) -> dispatch::Result<Dispatcher>
where
    P: SocialBackend,
    F: SocialBackend,
{
    Dispatcher::new(
        bindings(primary, fallback, store),
        availability,
        force_fallback,
        policy,
    )
}

async fn remember_login(op: Op, store: &CredentialStore, result: Result<Value>) -> Result<Value> {
    if op != Op::Login {
        return result;
    }
    if let Ok(value) = &result {
        match serde_json::from_value::<TokenPair>(value.clone()) {
            Ok(pair) => {
                store.set(Session::from(pair)).await;
                info!("session stored after login");
            }
            Err(e) => warn!(error = %e, "login response carried no token pair"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalApi;
    use crate::remote::RemoteApi;
    use serde_json::json;
    use std::time::Duration;
    use transport::{RefreshCoordinator, Transport};

    fn unreachable_remote(store: Arc<CredentialStore>) -> Arc<RemoteApi> {
        let client = reqwest::Client::new();
        let refresh = Arc::new(RefreshCoordinator::new(
            store,
            client.clone(),
            "http://127.0.0.1:1/auth/refresh",
            Duration::from_secs(1),
        ));
        Arc::new(RemoteApi::new(Arc::new(Transport::new(
            client,
            "http://127.0.0.1:1",
            Duration::from_secs(1),
            refresh,
        ))))
    }

    #[tokio::test]
    async fn every_operation_is_bound() {
        let store = Arc::new(CredentialStore::in_memory(Session::empty()));
        let d = dispatcher(
            unreachable_remote(store.clone()),
            Arc::new(LocalApi::seeded()),
            store,
            Arc::new(Availability::new()),
            false,
            FailurePolicy::default(),
        )
        .unwrap();
        assert_eq!(d.operation_names().len(), Op::ALL.len());
        for op in Op::ALL {
            assert!(d.has_operation(op.name()), "{} missing", op.name());
        }
    }

    #[tokio::test]
    async fn network_failure_is_served_locally() {
        let store = Arc::new(CredentialStore::in_memory(Session::new("A1", "R1")));
        let d = dispatcher(
            unreachable_remote(store.clone()),
            Arc::new(LocalApi::seeded()),
            store,
            Arc::new(Availability::with_initial(true)),
            false,
            FailurePolicy::default(),
        )
        .unwrap();

        let posts = d.call("listPosts", Value::Null).await.unwrap();
        assert_eq!(posts.as_array().unwrap().len(), 3);
        assert!(!d.availability().is_available().await);
    }

    #[tokio::test]
    async fn local_login_leaves_credentials_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = Arc::new(CredentialStore::load(path.clone()).await);
        let d = dispatcher(
            unreachable_remote(store.clone()),
            Arc::new(LocalApi::seeded()),
            store.clone(),
            Arc::new(Availability::new()),
            false,
            FailurePolicy::default(),
        )
        .unwrap();

        let resp = d
            .call("login", json!({"username": "user1", "password": "password"}))
            .await
            .unwrap();
        assert!(resp["token"].as_str().unwrap().starts_with("local-access-"));
        assert!(!store.get().await.is_authenticated());
        assert!(!path.exists(), "local login must not persist a session");
    }

    #[tokio::test]
    async fn remote_login_stores_session() {
        let store = Arc::new(CredentialStore::in_memory(Session::empty()));
        let pair = json!({"token": "A1", "refreshToken": "R1", "user": {"id": "1"}});
        let stored = remember_login(Op::Login, &store, Ok(pair)).await.unwrap();
        assert_eq!(stored["token"], "A1");
        let session = store.get().await;
        assert_eq!(session.access_token(), Some("A1"));
        assert_eq!(session.refresh_token(), Some("R1"));

        // Failures and other operations leave the session alone.
        store.clear().await;
        let rejected = Err(transport::Error::Auth {
            status: 401,
            message: "invalid credentials".into(),
        });
        assert!(remember_login(Op::Login, &store, rejected).await.is_err());
        let ping = json!({"token": "X", "refreshToken": "Y"});
        let _ = remember_login(Op::Ping, &store, Ok(ping)).await;
        assert!(!store.get().await.is_authenticated());
    }

    #[tokio::test]
    async fn malformed_args_fail_without_fallback_substitution() {
        let store = Arc::new(CredentialStore::in_memory(Session::empty()));
        let d = dispatcher(
            unreachable_remote(store.clone()),
            Arc::new(LocalApi::seeded()),
            store,
            Arc::new(Availability::with_initial(true)),
            false,
            FailurePolicy::default(),
        )
        .unwrap();

        let err = d.call("getPost", json!({"wrong": 1})).await.unwrap_err();
        assert!(
            matches!(
                err,
                dispatch::Error::Primary(transport::Error::InvalidRequest(_))
            ),
            "got {err:?}"
        );
        assert!(d.availability().is_available().await);
    }
}
