//! Token validation port.
//!
//! Defines the contract for turning an opaque bearer token into an
//! [`Identity`]. Implementations exist for HS256 JWTs and for tests; an
//! introspection-based validator would slot in the same way.
//!
//! # Example Implementation
//!
//! ```ignore
//! pub struct IntrospectionValidator { ... }
//!
//! #[async_trait]
//! impl TokenValidator for IntrospectionValidator {
//!     async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
//!         // 1. POST token to the introspection endpoint
//!         // 2. Reject inactive tokens
//!         // 3. Map `sub` to Identity
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, Identity};

/// Validates bearer tokens presented on connect.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for malformed or badly signed tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate a raw token (without any `Bearer ` prefix).
    async fn validate(&self, token: &str) -> Result<Identity, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    struct FixedTokenValidator;

    #[async_trait]
    impl TokenValidator for FixedTokenValidator {
        async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
            match token {
                "good" => Ok(Identity::new(UserId::new("user-1").unwrap())),
                "old" => Err(AuthError::TokenExpired),
                _ => Err(AuthError::InvalidToken),
            }
        }
    }

    #[tokio::test]
    async fn validator_is_usable_as_trait_object() {
        let validator: std::sync::Arc<dyn TokenValidator> = std::sync::Arc::new(FixedTokenValidator);

        assert!(validator.validate("good").await.is_ok());
        assert_eq!(validator.validate("old").await, Err(AuthError::TokenExpired));
        assert_eq!(validator.validate("bad").await, Err(AuthError::InvalidToken));
    }
}
