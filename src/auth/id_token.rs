//! Identity token claim checks
//!
//! The identity token is received directly from the token endpoint over
//! TLS, so its signature is not verified here (OpenID Connect Core 1.0,
//! section 3.1.3.7). The claims that bind it to this attempt are checked:
//! `nonce`, `iss`, `aud`, and `exp`.

use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::discovery::normalize_issuer;
use crate::error::{LoginError, Result};

/// Clock skew tolerated on `exp`, in seconds.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

/// The subset of identity token claims this crate checks.
#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    aud: Audience,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decodes the payload segment of a compact JWT without verifying it.
///
/// # Errors
///
/// Returns [`LoginError::IdToken`] when the token is not three dot-separated
/// segments or the payload is not base64url JSON with the expected claims.
pub fn decode_claims(id_token: &str) -> Result<IdTokenClaims> {
    let mut segments = id_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(LoginError::IdToken("not a compact JWT".to_string()));
    };

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| LoginError::IdToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| LoginError::IdToken(format!("payload is not valid claims JSON: {e}")))
}

/// Decodes `id_token` and checks it belongs to this attempt.
///
/// # Errors
///
/// Returns [`LoginError::IdToken`] when the nonce is missing or differs,
/// the issuer differs, the audience does not include `client_id`, or the
/// token has expired.
pub fn verify(id_token: &str, issuer: &str, client_id: &str, nonce: &str) -> Result<IdTokenClaims> {
    let claims = decode_claims(id_token)?;

    match claims.nonce.as_deref() {
        Some(returned) if returned.as_bytes() == nonce.as_bytes() => {}
        Some(_) => return Err(LoginError::IdToken("nonce mismatch".to_string())),
        None => return Err(LoginError::IdToken("nonce missing".to_string())),
    }

    if normalize_issuer(&claims.iss) != normalize_issuer(issuer) {
        return Err(LoginError::IdToken(format!(
            "issuer mismatch: expected '{issuer}', got '{}'",
            claims.iss
        )));
    }

    if !claims.aud.contains(client_id) {
        return Err(LoginError::IdToken(
            "audience does not include this client".to_string(),
        ));
    }

    if let Some(exp) = claims.exp {
        if exp.saturating_add(EXPIRY_LEEWAY_SECS) < Utc::now().timestamp() {
            return Err(LoginError::IdToken("token has expired".to_string()));
        }
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(claims: serde_json::Value) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
            engine.encode(claims.to_string()),
            engine.encode(b"signature")
        )
    }

    fn valid_claims() -> serde_json::Value {
        serde_json::json!({
            "iss": "https://id.example.com",
            "sub": "user-42",
            "aud": "app",
            "nonce": "n-0S6_WzA2Mj",
            "exp": Utc::now().timestamp() + 600
        })
    }

    #[test]
    fn test_verify_accepts_matching_claims() {
        let token = encode(valid_claims());
        let claims = verify(&token, "https://id.example.com/", "app", "n-0S6_WzA2Mj").unwrap();
        assert_eq!(claims.sub, "user-42");
    }

    #[test]
    fn test_verify_accepts_audience_array() {
        let mut claims = valid_claims();
        claims["aud"] = serde_json::json!(["other", "app"]);
        assert!(verify(&encode(claims), "https://id.example.com", "app", "n-0S6_WzA2Mj").is_ok());
    }

    #[test]
    fn test_verify_rejects_nonce_mismatch() {
        let err = verify(&encode(valid_claims()), "https://id.example.com", "app", "other")
            .unwrap_err();
        assert!(err.to_string().contains("nonce mismatch"), "{err}");
    }

    #[test]
    fn test_verify_rejects_missing_nonce() {
        let mut claims = valid_claims();
        claims.as_object_mut().unwrap().remove("nonce");
        let err = verify(&encode(claims), "https://id.example.com", "app", "n").unwrap_err();
        assert!(err.to_string().contains("nonce missing"), "{err}");
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let err = verify(
            &encode(valid_claims()),
            "https://other.example.com",
            "app",
            "n-0S6_WzA2Mj",
        )
        .unwrap_err();
        assert!(err.to_string().contains("issuer mismatch"), "{err}");
    }

    #[test]
    fn test_verify_rejects_wrong_audience() {
        let err = verify(&encode(valid_claims()), "https://id.example.com", "nope", "n-0S6_WzA2Mj")
            .unwrap_err();
        assert!(err.to_string().contains("audience"), "{err}");
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let mut claims = valid_claims();
        claims["exp"] = serde_json::json!(Utc::now().timestamp() - 3600);
        let err = verify(&encode(claims), "https://id.example.com", "app", "n-0S6_WzA2Mj")
            .unwrap_err();
        assert!(err.to_string().contains("expired"), "{err}");
    }

    #[test]
    fn test_verify_accepts_far_future_expiry() {
        let mut claims = valid_claims();
        claims["exp"] = serde_json::json!(i64::MAX);
        let verified = verify(&encode(claims), "https://id.example.com", "app", "n-0S6_WzA2Mj");
        assert!(verified.is_ok(), "{verified:?}");
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode_claims("only.two").is_err());
        assert!(decode_claims("a.b.c.d").is_err());
        assert!(decode_claims("a.!!!.c").is_err());
        assert!(decode_claims("").is_err());
    }
}
