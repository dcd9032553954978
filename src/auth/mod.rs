//! Authentication module for the DevGuard client.
//!
//! The function endpoints accept the project's publishable key as a bearer
//! token.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::config::key_hint;
use crate::errors::DevGuardError;

/// Authentication provider trait.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> Result<(), DevGuardError>;
}

/// Publishable key authentication provider.
///
/// Sends the key as `Authorization: Bearer <key>` and as `apikey`.
pub struct PublishableKeyAuth {
    api_key: SecretString,
}

impl PublishableKeyAuth {
    /// Creates a new provider.
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    /// Creates from a string key.
    pub fn from_string(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
        }
    }

    /// Gets a hint of the key for debugging (last 4 characters).
    pub fn key_hint(&self) -> String {
        key_hint(self.api_key.expose_secret())
    }
}

impl AuthProvider for PublishableKeyAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        let key = self.api_key.expose_secret();
        headers.insert("Authorization".to_string(), format!("Bearer {}", key));
        headers.insert("apikey".to_string(), key.clone());
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), DevGuardError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(DevGuardError::Configuration {
                message: "Publishable key cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for PublishableKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishableKeyAuth")
            .field("api_key", &"[REDACTED]")
            .field("key_hint", &self.key_hint())
            .finish()
    }
}
