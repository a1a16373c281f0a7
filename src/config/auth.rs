//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Minimum HS256 secret length accepted in production.
pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Authentication configuration (HS256 JWT)
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Shared secret used to verify token signatures
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, if tokens carry one
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud` claim, if tokens carry one
    #[serde(default)]
    pub audience: Option<String>,

    /// Clock skew tolerated on `exp`, in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::new(jwt_secret.into()),
            issuer: None,
            audience: None,
            leeway_secs: default_leeway(),
        }
    }

    /// Validate authentication configuration
    ///
    /// In production, requires a secret of at least 32 bytes.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }

        if *environment == Environment::Production && secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ValidationError::WeakJwtSecret {
                min: MIN_PRODUCTION_SECRET_LEN,
            });
        }

        Ok(())
    }
}

fn default_leeway() -> u64 {
    30
}
