//! Userinfo endpoint

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Claims describing the signed-in user.
///
/// `sub` is the durable identity external systems should key on; the other
/// fields are display data and may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject identifier, unique per user at this issuer.
    pub sub: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Claims not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Fetches the user's claims with `Authorization: Bearer <access_token>`.
///
/// Returns a plain message on failure; the caller wraps it together with the
/// already acquired tokens.
pub(crate) async fn fetch_userinfo(
    http: &reqwest::Client,
    endpoint: &str,
    access_token: &str,
    timeout: Duration,
) -> std::result::Result<IdentityClaims, String> {
    tracing::debug!(endpoint, "fetching userinfo");

    let resp = http
        .get(endpoint)
        .bearer_auth(access_token)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| format!("userinfo request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(format!("userinfo endpoint returned {status}"));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| format!("failed to read userinfo response: {e}"))?;
    let claims: IdentityClaims = serde_json::from_str(&body)
        .map_err(|e| format!("failed to parse userinfo response: {e}"))?;

    if claims.sub.is_empty() {
        return Err("userinfo response has an empty 'sub'".to_string());
    }
    Ok(claims)
}
