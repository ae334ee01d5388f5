//! Remote token refresh
//!
//! POSTs the current refresh token to the refresh endpoint and returns the
//! renewed pair. Any non-2xx answer is a refresh failure; the caller decides
//! what a failure means for the session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Token pair returned by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange a refresh token for a new access + refresh pair.
pub async fn refresh_session(
    client: &reqwest::Client,
    url: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenPair> {
    let response = client
        .post(url)
        .timeout(timeout)
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let pair = response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if pair.token.is_empty() || pair.refresh_token.is_empty() {
        return Err(Error::InvalidResponse(
            "refresh response is missing a token".into(),
        ));
    }
    Ok(pair)
}
