//! Secure handling of the hub access token.
//!
//! Tokens are wrapped so they never show up in logs, error messages or
//! `Debug` output of the configuration.

use std::fmt;

/// A string type that redacts its content in Debug and Display implementations.
///
/// The underlying value can only be accessed explicitly via
/// [`expose_secret`][SecretString::expose_secret].
///
/// # Example
///
/// ```
/// use llmprep_core::SecretString;
///
/// let token = SecretString::new("hf_secret_12345");
///
/// assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
/// assert_eq!(format!("{}", token), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "hf_secret_12345");
/// ```
#[derive(Clone, Default)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Create a new `SecretString` from a string value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            inner: secret.into(),
        }
    }

    /// Read a secret from an environment variable.
    ///
    /// Unset, non-unicode and empty values all yield `None`.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }

    /// Expose the secret value.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Check if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the length of the secret.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_redacts() {
        let secret = SecretString::new("hf_abc");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose_secret(), "hf_abc");
    }

    #[test]
    fn test_secret_string_len() {
        let secret = SecretString::new("12345");
        assert_eq!(secret.len(), 5);
        assert!(!secret.is_empty());
        assert!(SecretString::default().is_empty());
    }

    #[test]
    fn test_from_env_skips_missing_and_empty() {
        assert!(SecretString::from_env("LLMPREP_TEST_SURELY_UNSET_VAR").is_none());

        std::env::set_var("LLMPREP_TEST_EMPTY_SECRET", "");
        assert!(SecretString::from_env("LLMPREP_TEST_EMPTY_SECRET").is_none());

        std::env::set_var("LLMPREP_TEST_SET_SECRET", "hf_xyz");
        let secret = SecretString::from_env("LLMPREP_TEST_SET_SECRET").unwrap();
        assert_eq!(secret.expose_secret(), "hf_xyz");
    }
}
