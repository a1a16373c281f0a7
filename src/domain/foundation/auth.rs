//! Authentication types for the domain layer.
//!
//! These types represent the identity behind a validated bearer token.
//! They have **no external dependencies**: any token scheme (HS256 JWT,
//! an upstream introspection endpoint, a test map) can produce them via the
//! `TokenValidator` port.
//!
//! # Example
//!
//! ```ignore
//! let identity = validator.validate(token).await?;
//! tracing::info!(user_id = %identity.user_id, "connection authenticated");
//! ```

use super::UserId;
use thiserror::Error;

/// Identity extracted from a validated token.
///
/// Immutable once a connection has been admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The token subject.
    pub user_id: UserId,

    /// Tenant (warehouse/organization) the user acts for, if the token carries one.
    pub tenant_id: Option<String>,
}

impl Identity {
    /// Creates an identity for a user without tenant scoping.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            tenant_id: None,
        }
    }

    /// Attaches a tenant to the identity.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Authentication errors that can occur during token validation.
///
/// Every variant results in the connection never being admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token was supplied with the connection request.
    #[error("Missing token")]
    MissingToken,

    /// The token is malformed or has an invalid signature or claims.
    #[error("Invalid token")]
    InvalidToken,

    /// The token signature is valid but it has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authentication collaborator is unavailable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
