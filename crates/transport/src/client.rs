//! Authenticated HTTP client for the remote service

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use session::CredentialStore;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::policy::{Disposition, FailurePolicy, classify};
use crate::refresh::RefreshCoordinator;
use crate::request::ApiRequest;

/// Issues requests against `base_url` with the stored bearer token.
///
/// Cheap to share behind an `Arc`; all mutable state lives in the credential
/// store and the refresh coordinator.
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl Transport {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
            store: Arc::clone(refresh.credential_store()),
            refresh,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// Perform `request`, refreshing credentials and replaying once on 401.
    ///
    /// Returns the decoded JSON body, or `Value::Null` for an empty one.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn call(&self, request: &ApiRequest) -> Result<Value> {
        let mut token = if request.authenticated {
            self.store.get().await.access_token().map(str::to_string)
        } else {
            None
        };
        let mut retried = false;

        loop {
            let err = match self.send(request, token.as_deref()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !request.authenticated {
                return Err(err);
            }
            match classify(&err, retried, FailurePolicy::default()) {
                Disposition::Retry => {
                    debug!("401 received, obtaining fresh token");
                    token = Some(self.refresh.obtain_fresh_token(token.as_deref()).await?);
                    retried = true;
                }
                Disposition::Fallback | Disposition::Propagate => return Err(err),
            }
        }
    }

    /// `call` plus typed decoding of the body.
    pub async fn call_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let value = self.call(request).await?;
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<Value> {
        let url = self.url_for(request)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(self.timeout);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!("transport_requests_total", "status" => "error").increment(1);
                warn!(error = %e, timeout = e.is_timeout(), "request failed before a response");
                return Err(Error::Network(e.to_string()));
            }
        };

        let status = response.status();
        metrics::counter!("transport_requests_total", "status" => status.as_u16().to_string())
            .increment(1);
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "remote returned an error status");
            return Err(Error::from_status(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| Error::Decode(e.to_string()))
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let raw = format!("{}{}", self.base_url, request.path);
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::InvalidRequest(format!("bad url {raw}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}
