//! Token endpoint response handling

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens returned by the provider's token endpoint.
///
/// The crate never persists a `TokenSet`; the caller owns its lifecycle.
/// `Debug` output redacts every token string.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token presented to the userinfo endpoint and to APIs.
    pub access_token: String,

    /// Token type reported by the provider, usually `"Bearer"`.
    pub token_type: Option<String>,

    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<String>,

    /// OIDC identity token (a JWT), when the provider issued one.
    pub id_token: Option<String>,

    /// Access token lifetime in seconds, as reported by the provider.
    pub expires_in: Option<u64>,

    /// Granted scope, when it differs from the requested one.
    pub scope: Option<String>,

    /// When the token response was received.
    pub issued_at: DateTime<Utc>,
}

impl TokenSet {
    /// Absolute expiry of the access token, if the provider reported a
    /// lifetime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        self.issued_at
            .checked_add_signed(chrono::Duration::try_seconds(secs)?)
    }

    /// Returns `true` when the access token has a known expiry that has
    /// already passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| at <= Utc::now())
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "<redacted>" } else { "<none>" };
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &redact(self.refresh_token.is_some()))
            .field("id_token", &redact(self.id_token.is_some()))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Raw JSON response from a token endpoint.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Converts the raw response into a [`TokenSet`] stamped with the
    /// current time.
    pub(crate) fn into_token_set(self) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            id_token: self.id_token,
            expires_in: self.expires_in,
            scope: self.scope,
            issued_at: Utc::now(),
        }
    }
}

/// OAuth 2.0 error response body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Summarises a non-success token endpoint body.
///
/// Recognised OAuth error bodies become `error: description`. Returns `None`
/// for anything else so provider HTML pages are not echoed into errors.
pub(crate) fn describe_error_body(body: &str) -> Option<String> {
    let parsed: OAuthErrorBody = serde_json::from_str(body).ok()?;
    Some(match parsed.error_description {
        Some(desc) if !desc.is_empty() => format!("{}: {}", parsed.error, desc),
        _ => parsed.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_minimal_body() {
        let raw: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok","expires_in":3600}"#).unwrap();
        let tokens = raw.into_token_set();
        assert_eq!(tokens.access_token, "tok");
        assert_eq!(tokens.expires_in, Some(3600));
        assert!(tokens.refresh_token.is_none());
        assert!(tokens.id_token.is_none());
        assert!(tokens.token_type.is_none());
    }

    #[test]
    fn test_token_response_rejects_missing_access_token() {
        let raw = serde_json::from_str::<TokenResponse>(r#"{"expires_in":3600}"#);
        assert!(raw.is_err());
    }

    #[test]
    fn test_expires_at_adds_lifetime() {
        let raw: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok","expires_in":60}"#).unwrap();
        let tokens = raw.into_token_set();
        let at = tokens.expires_at().expect("lifetime was reported");
        assert_eq!((at - tokens.issued_at).num_seconds(), 60);
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_no_expiry_when_lifetime_missing() {
        let raw: TokenResponse = serde_json::from_str(r#"{"access_token":"tok"}"#).unwrap();
        let tokens = raw.into_token_set();
        assert!(tokens.expires_at().is_none());
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let raw: TokenResponse = serde_json::from_str(concat!(
            r#"{"access_token":"secret-access","#,
            r#""refresh_token":"secret-refresh","id_token":"a.b.c"}"#
        ))
        .unwrap();
        let debug = format!("{:?}", raw.into_token_set());
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(!debug.contains("a.b.c"));
    }

    #[test]
    fn test_describe_error_body_oauth_error() {
        let body = r#"{"error":"invalid_grant","error_description":"code expired"}"#;
        assert_eq!(
            describe_error_body(body),
            Some("invalid_grant: code expired".to_string())
        );
        assert_eq!(
            describe_error_body(r#"{"error":"invalid_client"}"#),
            Some("invalid_client".to_string())
        );
    }

    #[test]
    fn test_describe_error_body_non_oauth_body() {
        assert!(describe_error_body("<html>oops</html>").is_none());
    }
}
