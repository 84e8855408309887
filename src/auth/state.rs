//! Per-attempt anti-CSRF `state` and anti-replay `nonce`

use crate::auth::pkce::random_urlsafe;
use crate::error::Result;

/// Random bytes behind each of `state` and `nonce`.
const TOKEN_BYTES: usize = 24;

/// The `state` and `nonce` values of one login attempt.
///
/// Both values are fresh OS randomness on every call to
/// [`AttemptState::generate`]. The type is neither `Clone` nor `Default`,
/// so a value cannot be carried over into another attempt.
#[derive(Debug)]
pub struct AttemptState {
    state: String,
    nonce: String,
}

impl AttemptState {
    /// Generates a new `state` and `nonce`, 32 base64url characters each.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Randomness`](crate::error::LoginError::Randomness)
    /// if the OS randomness source fails.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            state: random_urlsafe(TOKEN_BYTES)?,
            nonce: random_urlsafe(TOKEN_BYTES)?,
        })
    }

    /// The anti-CSRF value sent in the authorization request.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The anti-replay value bound into the identity token.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Compares a returned `state` with this attempt's value byte for byte.
    pub fn matches_state(&self, returned: &str) -> bool {
        self.state.as_bytes() == returned.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_and_nonce_are_unique_across_many_attempts() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let attempt = AttemptState::generate().expect("randomness");
            assert!(seen.insert(attempt.state().to_string()), "duplicate state");
            assert!(seen.insert(attempt.nonce().to_string()), "duplicate nonce");
        }
        assert_eq!(seen.len(), 20_000);
    }

    #[test]
    fn test_state_differs_from_nonce() {
        let attempt = AttemptState::generate().expect("randomness");
        assert_ne!(attempt.state(), attempt.nonce());
        assert_eq!(attempt.state().len(), 32);
        assert_eq!(attempt.nonce().len(), 32);
    }

    #[test]
    fn test_matches_state_is_exact() {
        let attempt = AttemptState::generate().expect("randomness");
        let state = attempt.state().to_string();
        assert!(attempt.matches_state(&state));

        let mut altered: Vec<char> = state.chars().collect();
        altered[0] = if altered[0] == 'A' { 'B' } else { 'A' };
        let altered: String = altered.into_iter().collect();
        assert!(!attempt.matches_state(&altered));

        if let Some(pos) = state.find(|c: char| c.is_ascii_alphabetic()) {
            let mut case_flipped = state.clone();
            let c = state.as_bytes()[pos] as char;
            let flipped = if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            };
            case_flipped.replace_range(pos..pos + 1, &flipped.to_string());
            assert!(!attempt.matches_state(&case_flipped), "comparison must be case-sensitive");
        }
        assert!(!attempt.matches_state(&format!("{state} ")));
        assert!(!attempt.matches_state(""));
    }
}
