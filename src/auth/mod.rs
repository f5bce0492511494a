//! Authentication for the Moonshot API.
//!
//! Requests carry the user's API key as a bearer token. The key lives in a
//! [`Credential`], which keeps it in a `SecretString` and never prints it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::errors::{ClientError, ClientResult};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "MOONSHOT_API_KEY";

/// An opaque, non-empty bearer token.
#[derive(Clone)]
pub struct Credential {
    api_key: SecretString,
}

impl Credential {
    /// Creates a credential, trimming surrounding whitespace.
    ///
    /// Fails when the key is empty after trimming.
    pub fn new(api_key: impl Into<String>) -> ClientResult<Self> {
        let api_key = api_key.into();
        let trimmed = api_key.trim();

        if trimmed.is_empty() {
            return Err(ClientError::configuration("API key is required"));
        }

        Ok(Self {
            api_key: SecretString::new(trimmed.to_string()),
        })
    }

    /// Reads the credential from `MOONSHOT_API_KEY`.
    pub fn from_env() -> ClientResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            ClientError::configuration(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        Self::new(api_key)
    }

    /// Returns the raw key.
    pub fn expose(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns a hint of the key (last 4 characters) for debugging.
    pub fn hint(&self) -> String {
        let key = self.api_key.expose_secret();
        let chars: Vec<char> = key.chars().collect();
        if chars.len() > 4 {
            format!("...{}", chars[chars.len() - 4..].iter().collect::<String>())
        } else {
            "****".to_string()
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"[REDACTED]")
            .field("hint", &self.hint())
            .finish()
    }
}

/// Authentication provider trait.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;
}

/// Bearer token authentication provider.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    credential: Credential,
}

impl BearerAuth {
    /// Creates a bearer provider for a credential.
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl AuthProvider for BearerAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.credential.expose()),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_bearer_auth_apply() {
        let auth = BearerAuth::new(Credential::new("sk-test-key-12345").unwrap());
        let mut headers = HashMap::new();

        auth.apply_auth(&mut headers);

        assert_eq!(
            headers.get("Authorization"),
            Some(&"Bearer sk-test-key-12345".to_string())
        );
        assert_eq!(auth.scheme(), "Bearer");
    }

    #[test]
    fn test_credential_rejects_blank() {
        let err = Credential::new("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_credential_trims() {
        let credential = Credential::new("  sk-abc  ").unwrap();
        assert_eq!(credential.expose(), "sk-abc");
    }

    #[test]
    fn test_hint() {
        assert_eq!(Credential::new("sk-test-12345").unwrap().hint(), "...2345");
        assert_eq!(Credential::new("abc").unwrap().hint(), "****");
    }

    #[test]
    fn test_debug_redacts_key() {
        let credential = Credential::new("sk-secret-key").unwrap();
        let debug_str = format!("{credential:?}");

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("sk-secret-key"));
    }
}
