//! Secure credential handling for the cost estimation tool
//!
//! The API key is read from the environment on demand and wrapped in the
//! `secrecy` crate to prevent accidental exposure in logs or memory dumps.
//! It is never stored in configuration files.

use secrecy::{ExposeSecret, SecretString};
use std::env;

/// Environment variable holding the cost estimation API key
pub const COST_API_KEY_VAR: &str = "INFRACOST_API_KEY";

/// Credential source for the cost estimation tool
///
/// # Examples
///
/// ```
/// use module_publisher::security::CostCredentials;
///
/// let credentials = CostCredentials::from_env();
/// if credentials.is_configured() {
///     println!("cost estimation enabled");
/// }
/// ```
#[derive(Default)]
pub struct CostCredentials {
    api_key: Option<SecretString>,
}

impl CostCredentials {
    /// Read the API key from the environment
    ///
    /// An unset or empty variable yields an unconfigured credential; cost
    /// estimation is then skipped without error.
    pub fn from_env() -> Self {
        let api_key = env::var(COST_API_KEY_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::new(value.into()));

        Self { api_key }
    }

    /// Build credentials from an already obtained key (for tests)
    pub fn from_key(key: &str) -> Self {
        Self {
            api_key: Some(SecretString::new(key.into())),
        }
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// The raw API key, exposed only at the subprocess boundary
    pub fn expose_api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret())
    }

    /// Masks the key for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification.
    /// Keys shorter than 10 characters are fully masked as "****".
    pub fn masked(&self) -> String {
        match self.expose_api_key() {
            Some(key) if key.chars().count() >= 10 => {
                let chars: Vec<char> = key.chars().collect();
                let head: String = chars[..3].iter().collect();
                let tail: String = chars[chars.len() - 3..].iter().collect();
                format!("{}...{}", head, tail)
            }
            Some(_) => "****".to_string(),
            None => "(未設定)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_is_configured() {
        let credentials = CostCredentials::from_key("ico-test-key-12345");
        assert!(credentials.is_configured());
        assert_eq!(credentials.expose_api_key(), Some("ico-test-key-12345"));
    }

    #[test]
    fn test_default_is_unconfigured() {
        let credentials = CostCredentials::default();
        assert!(!credentials.is_configured());
        assert_eq!(credentials.expose_api_key(), None);
    }

    #[test]
    fn test_masked_long_key() {
        let credentials = CostCredentials::from_key("ico-abcdef123456");
        assert_eq!(credentials.masked(), "ico...456");
    }

    #[test]
    fn test_masked_multibyte_key() {
        // Boundaries fall inside multibyte characters; masking must not panic
        let credentials = CostCredentials::from_key("ééほげ-key-12345");
        assert_eq!(credentials.masked(), "ééほ...345");
    }

    #[test]
    fn test_masked_short_key() {
        let credentials = CostCredentials::from_key("short");
        assert_eq!(credentials.masked(), "****");
    }

    #[test]
    fn test_masked_unconfigured() {
        let credentials = CostCredentials::default();
        assert_eq!(credentials.masked(), "(未設定)");
    }
}
