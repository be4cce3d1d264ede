//! Verification handshake.
//!
//! Before enabling delivery the platform sends a GET carrying
//! `hub.mode`, `hub.verify_token` and `hub.challenge`. The relay proves it
//! knows the shared secret by echoing the challenge back.

use serde::Deserialize;

/// The only mode the dispatcher uses for a subscription handshake.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Query parameters of one verification request.
///
/// Every field is optional so that a missing parameter is a failed
/// verification rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct VerificationChallenge {
    #[serde(default, rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(default, rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(default, rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl VerificationChallenge {
    /// Check the challenge against the configured secret.
    ///
    /// Returns the challenge to echo when the mode is `subscribe` and the
    /// token matches exactly. A missing `hub.challenge` echoes an empty body.
    pub fn verify(self, expected_token: &str) -> Option<String> {
        let mode_ok = self.mode.as_deref() == Some(SUBSCRIBE_MODE);
        let token_ok = self
            .verify_token
            .as_deref()
            .map(|provided| constant_time_compare(provided, expected_token))
            .unwrap_or(false);

        if mode_ok && token_ok {
            Some(self.challenge.unwrap_or_default())
        } else {
            None
        }
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "innovatehub_verify_2024";

    fn challenge(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerificationChallenge {
        VerificationChallenge {
            mode: mode.map(str::to_string),
            verify_token: token.map(str::to_string),
            challenge: challenge.map(str::to_string),
        }
    }

    #[test]
    fn test_verify_success_echoes_challenge() {
        let c = challenge(Some("subscribe"), Some(SECRET), Some("abc123"));
        assert_eq!(c.verify(SECRET), Some("abc123".to_string()));
    }

    #[test]
    fn test_verify_wrong_token() {
        let c = challenge(Some("subscribe"), Some("wrong"), Some("abc123"));
        assert_eq!(c.verify(SECRET), None);
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let c = challenge(Some("subscribe"), Some(&SECRET.to_uppercase()), Some("abc"));
        assert_eq!(c.verify(SECRET), None);

        let c = challenge(Some("Subscribe"), Some(SECRET), Some("abc"));
        assert_eq!(c.verify(SECRET), None);
    }

    #[test]
    fn test_verify_missing_fields() {
        assert_eq!(challenge(None, Some(SECRET), Some("abc")).verify(SECRET), None);
        assert_eq!(challenge(Some("subscribe"), None, Some("abc")).verify(SECRET), None);
        assert_eq!(VerificationChallenge::default().verify(SECRET), None);
    }

    #[test]
    fn test_verify_missing_challenge_echoes_empty() {
        let c = challenge(Some("subscribe"), Some(SECRET), None);
        assert_eq!(c.verify(SECRET), Some(String::new()));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
