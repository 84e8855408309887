//! Error types for loopback-oidc
//!
//! Every failure of a login attempt maps to exactly one [`LoginError`]
//! variant, so callers can tell "the user never finished signing in" apart
//! from "a security check failed" and from "the provider is misconfigured".

use std::time::Duration;

use thiserror::Error;

use crate::auth::token::TokenSet;

/// Main error type for login attempts
///
/// None of these errors are retried internally: authorization codes and
/// PKCE verifiers are single-use.
#[derive(Error, Debug)]
pub enum LoginError {
    /// A required login setting is missing or malformed. No network call
    /// has been made.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider discovery document could not be fetched or is unusable
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// The loopback listener could not be started or stopped unexpectedly
    #[error("Callback listener error: {0}")]
    Callback(String),

    /// No redirect callback arrived before the wait expired
    #[error("Timed out after {}s waiting for the sign-in redirect", .0.as_secs())]
    Timeout(Duration),

    /// The redirect callback arrived without an authorization code
    #[error(
        "No authorization code received{}",
        .provider_error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
    )]
    MissingCode {
        /// The `error` reported by the provider in the redirect, if any
        provider_error: Option<String>,
    },

    /// The `state` returned in the redirect does not match the attempt
    #[error("State mismatch in sign-in redirect (possible CSRF)")]
    StateMismatch,

    /// The token endpoint rejected the authorization code or was unreachable
    #[error("Token exchange error: {0}")]
    TokenExchange(String),

    /// The identity token failed nonce, issuer, audience, or expiry checks
    #[error("Identity token rejected: {0}")]
    IdToken(String),

    /// Tokens were acquired but the user profile could not be fetched
    #[error("Profile fetch error: {message}")]
    ProfileFetch {
        /// What went wrong while fetching the profile
        message: String,
        /// The token set acquired before the profile fetch failed
        tokens: Box<TokenSet>,
    },

    /// The operating system randomness source failed
    #[error("Randomness source failure: {0}")]
    Randomness(String),

    /// The caller cancelled the attempt
    #[error("Login cancelled")]
    Cancelled,
}

/// Copyable discriminant of a [`LoginError`], used to report the terminal
/// `Failed` stage of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Configuration,
    Discovery,
    Callback,
    Timeout,
    MissingCode,
    StateMismatch,
    TokenExchange,
    IdToken,
    ProfileFetch,
    Randomness,
    Cancelled,
}

impl LoginError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::Discovery(_) => FailureKind::Discovery,
            Self::Callback(_) => FailureKind::Callback,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::MissingCode { .. } => FailureKind::MissingCode,
            Self::StateMismatch => FailureKind::StateMismatch,
            Self::TokenExchange(_) => FailureKind::TokenExchange,
            Self::IdToken(_) => FailureKind::IdToken,
            Self::ProfileFetch { .. } => FailureKind::ProfileFetch,
            Self::Randomness(_) => FailureKind::Randomness,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Returns `true` when the attempt was rejected by a security check
    /// rather than by a user action or a provider problem.
    pub fn is_security_failure(&self) -> bool {
        matches!(self, Self::StateMismatch | Self::IdToken(_))
    }

    /// Returns the token set carried by a [`LoginError::ProfileFetch`].
    pub fn tokens(&self) -> Option<&TokenSet> {
        match self {
            Self::ProfileFetch { tokens, .. } => Some(&**tokens),
            _ => None,
        }
    }
}

/// Result type alias for login operations
pub type Result<T> = std::result::Result<T, LoginError>;
