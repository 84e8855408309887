//! OpenID Connect discovery
//!
//! Fetches the provider's `/.well-known/openid-configuration` document to
//! learn the authorization, token, and userinfo endpoint URLs.
//!
//! The document is fetched once per login attempt and never cached across
//! attempts. There are no retries: a broken discovery endpoint is a
//! configuration problem for the caller to fix.
//!
//! # References
//!
//! - OpenID Connect Discovery 1.0 <https://openid.net/specs/openid-connect-discovery-1_0.html>

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::pkce::CHALLENGE_METHOD;
use crate::error::{LoginError, Result};

/// Path appended to the issuer to locate the discovery document.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Default bound on the discovery request.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Provider metadata published at the OIDC discovery endpoint.
///
/// # Examples
///
/// ```
/// use loopback_oidc::auth::discovery::DiscoveryDocument;
///
/// let json = r#"{
///     "authorization_endpoint": "https://id.example.com/authorize",
///     "token_endpoint": "https://id.example.com/token",
///     "userinfo_endpoint": "https://id.example.com/userinfo"
/// }"#;
///
/// let doc: DiscoveryDocument = serde_json::from_str(json).unwrap();
/// assert_eq!(doc.token_endpoint, "https://id.example.com/token");
/// assert!(doc.issuer.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// The issuer identifier the provider claims for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// URL the user's browser is sent to for sign-in.
    pub authorization_endpoint: String,

    /// URL the authorization code is exchanged at.
    pub token_endpoint: String,

    /// URL returning the signed-in user's claims.
    pub userinfo_endpoint: String,

    /// URL of the provider's signing keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// RP-initiated logout endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// PKCE challenge methods the provider supports (e.g. `["S256"]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Metadata fields not modelled above.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DiscoveryDocument {
    /// Checks the document against the issuer it was fetched for.
    ///
    /// - every required endpoint must be an absolute URL;
    /// - an advertised `issuer` must equal `issuer` (trailing `/` ignored);
    /// - an advertised `code_challenge_methods_supported` list must contain
    ///   `S256`.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Discovery`] describing the first failed check.
    pub fn validate(&self, issuer: &str) -> Result<()> {
        for (name, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("userinfo_endpoint", &self.userinfo_endpoint),
        ] {
            Url::parse(value)
                .map_err(|e| LoginError::Discovery(format!("invalid {name} '{value}': {e}")))?;
        }

        if let Some(advertised) = &self.issuer {
            if normalize_issuer(advertised) != normalize_issuer(issuer) {
                return Err(LoginError::Discovery(format!(
                    "issuer mismatch: configured '{issuer}', provider reports '{advertised}'"
                )));
            }
        }

        if let Some(methods) = &self.code_challenge_methods_supported {
            if !methods.iter().any(|m| m == CHALLENGE_METHOD) {
                return Err(LoginError::Discovery(
                    "provider does not support PKCE S256".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Strips trailing slashes so `https://id.example.com/` and
/// `https://id.example.com` compare equal.
pub fn normalize_issuer(issuer: &str) -> &str {
    issuer.trim_end_matches('/')
}

/// Builds `<issuer>/.well-known/openid-configuration`.
pub fn discovery_url(issuer: &str) -> Result<Url> {
    let raw = format!("{}{}", normalize_issuer(issuer), WELL_KNOWN_PATH);
    Url::parse(&raw)
        .map_err(|e| LoginError::Discovery(format!("invalid discovery URL '{raw}': {e}")))
}

/// Fetches and validates the discovery document for `issuer`.
///
/// Issues a single GET bounded by `timeout`.
///
/// # Errors
///
/// Returns [`LoginError::Discovery`] on network failure, timeout, a non-2xx
/// status, malformed JSON, missing required endpoints, or a failed
/// [`DiscoveryDocument::validate`] check.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use loopback_oidc::auth::discovery::fetch_discovery;
///
/// # async fn example() -> loopback_oidc::error::Result<()> {
/// let http = reqwest::Client::new();
/// let doc = fetch_discovery(&http, "https://accounts.google.com", Duration::from_secs(15)).await?;
/// println!("token endpoint: {}", doc.token_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_discovery(
    http: &reqwest::Client,
    issuer: &str,
    timeout: Duration,
) -> Result<DiscoveryDocument> {
    let url = discovery_url(issuer)?;
    tracing::debug!(url = %url, "fetching discovery document");

    let resp = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LoginError::Discovery(format!("discovery request timed out after {timeout:?}"))
            } else {
                LoginError::Discovery(format!("discovery request failed: {e}"))
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(LoginError::Discovery(format!(
            "discovery endpoint returned {status}: {url}"
        )));
    }

    let body = resp
        .text()
        .await
        .map_err(|e| LoginError::Discovery(format!("failed to read discovery document: {e}")))?;
    let doc: DiscoveryDocument = serde_json::from_str(&body)
        .map_err(|e| LoginError::Discovery(format!("failed to parse discovery document: {e}")))?;

    doc.validate(issuer)?;
    Ok(doc)
}
