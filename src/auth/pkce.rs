//! PKCE S256 challenge generation
//!
//! Implements the Proof Key for Code Exchange (PKCE) extension to OAuth 2.0
//! as defined in RFC 7636, using the `S256` challenge method.
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy random string called the `code_verifier`.
//! 2. The client computes a SHA-256 hash of the verifier and base64url-encodes
//!    it to produce the `code_challenge`.
//! 3. The authorization request carries `code_challenge` and
//!    `code_challenge_method=S256`.
//! 4. The token exchange request carries the original `code_verifier`.
//! 5. The provider recomputes the challenge and compares it to the value
//!    sent in step 3, proving possession of the verifier.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use std::fmt;

use base64::Engine as _;
use rand::rngs::OsRng;
use rand::TryRngCore as _;
use sha2::{Digest, Sha256};

use crate::error::{LoginError, Result};

/// The only challenge method produced by this module.
pub const CHALLENGE_METHOD: &str = "S256";

/// Number of random bytes behind a code verifier.
const VERIFIER_BYTES: usize = 32;

/// A PKCE S256 pair consisting of a verifier and its derived challenge.
///
/// One pair belongs to exactly one login attempt. The verifier is only ever
/// transmitted in the token exchange request.
///
/// # Examples
///
/// ```
/// use loopback_oidc::auth::pkce::PkcePair;
///
/// let pkce = PkcePair::generate().expect("OS randomness is available");
/// assert_eq!(pkce.verifier().len(), 43);
/// assert_eq!(pkce.method(), "S256");
/// ```
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Generates a fresh PKCE S256 pair.
    ///
    /// The verifier is 32 bytes from the operating system CSPRNG encoded as
    /// base64url without padding (43 characters). The challenge is the
    /// base64url-encoded SHA-256 digest of the verifier's ASCII bytes
    /// (RFC 7636 section 4.2).
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Randomness`] when the OS randomness source
    /// fails. There is no fallback to a weaker generator.
    pub fn generate() -> Result<Self> {
        let verifier = random_urlsafe(VERIFIER_BYTES)?;
        let challenge = derive_challenge(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// The code verifier, sent only in the token exchange.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The code challenge, sent in the authorization request.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// The challenge method. Always `"S256"`.
    pub fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Computes `BASE64URL(SHA256(ASCII(verifier)))` without padding.
pub fn derive_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Returns `len` bytes from the OS randomness source encoded as base64url
/// without padding.
///
/// # Errors
///
/// Returns [`LoginError::Randomness`] if the OS source fails.
pub(crate) fn random_urlsafe(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| LoginError::Randomness(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
