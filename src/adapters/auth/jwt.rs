//! HS256 JWT adapter for token validation.
//!
//! Implements the `TokenValidator` port with a shared secret. It validates:
//!
//! - **Signature**: HS256 against the configured secret
//! - **Expiry (exp)**: Must be in the future, within the configured leeway
//! - **Issuer (iss)** and **Audience (aud)**: Only when configured
//!
//! `sub` becomes the user id; an optional `tenant_id` claim scopes the identity.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::domain::foundation::{AuthError, Identity, UserId};
use crate::ports::TokenValidator;

/// Claims read from bus tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

pub struct JwtTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    pub fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.expose_secret().as_bytes(),
            config.issuer.as_deref(),
            config.audience.as_deref(),
            config.leeway_secs,
        )
    }
}

#[async_trait]
impl TokenValidator for JwtTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<BusClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    tracing::warn!(error = %e, "Token issued for someone else");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!(error = %e, "Token validation failed");
                    AuthError::InvalidToken
                }
            })?
            .claims;

        let user_id = UserId::new(&claims.sub).map_err(|_| {
            tracing::warn!("Token has a blank subject");
            AuthError::InvalidToken
        })?;

        let identity = Identity::new(user_id);
        Ok(match claims.tenant_id {
            Some(tenant) if !tenant.trim().is_empty() => identity.with_tenant(tenant),
            _ => identity,
        })
    }
}
