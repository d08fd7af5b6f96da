//! API token providers.
//!
//! Token storage and sign-in live outside this client; the engine only asks
//! for the current bearer token. Tokens are wrapped in [`SecretString`] and
//! never logged.

use secrecy::{ExposeSecret, SecretString};

use farmlink_types::error::SyncError;

/// Environment variable read by [`EnvTokenProvider`] by default.
pub const TOKEN_ENV_VAR: &str = "FARMLINK_TOKEN";

/// Source of the bearer token sent with every request.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `AuthExpired` when there is none.
    fn token(&self) -> Result<SecretString, SyncError>;
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new() -> Self {
        Self::with_var(TOKEN_ENV_VAR)
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for EnvTokenProvider {
    fn token(&self) -> Result<SecretString, SyncError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token.trim().to_string())),
            // Unset, empty and non-unicode all mean "not signed in".
            _ => Err(SyncError::AuthExpired),
        }
    }
}

/// Fixed token, e.g. from a `--token` flag or in tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<SecretString>,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token: Some(token) }
    }

    pub fn missing() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Result<SecretString, SyncError> {
        match &self.token {
            Some(token) if !token.expose_secret().is_empty() => Ok(token.clone()),
            _ => Err(SyncError::AuthExpired),
        }
    }
}
