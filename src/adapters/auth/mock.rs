//! Mock token validator for testing.
//!
//! Implements the `TokenValidator` port without any signing keys, so tests
//! can hand out opaque tokens.
//!
//! # Example
//!
//! ```ignore
//! use inventory_event_bus::adapters::auth::MockTokenValidator;
//!
//! let validator = MockTokenValidator::new()
//!     .with_test_user("token-a", "user-a")
//!     .with_test_user("token-b", "user-b");
//!
//! let identity = validator.validate("token-a").await?;
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, Identity, UserId};
use crate::ports::TokenValidator;

/// Stores a map of tokens to identities. Unknown tokens return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockTokenValidator {
    tokens: RwLock<HashMap<String, Identity>>,
    /// Returned for every validation while set.
    force_error: RwLock<Option<AuthError>>,
}

impl MockTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(self, token: impl Into<String>, identity: Identity) -> Self {
        self.add_token(token, identity);
        self
    }

    /// Adds a token for a plain identity with the given user id.
    ///
    /// # Panics
    ///
    /// Panics if `user_id` is blank.
    pub fn with_test_user(self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        let user_id = UserId::new(user_id).expect("test user id must not be blank");
        self.with_identity(token, Identity::new(user_id))
    }

    pub fn with_error(self, error: AuthError) -> Self {
        *self.force_error.write().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self
    }

    pub fn clear_error(&self) {
        *self.force_error.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn add_token(&self, token: impl Into<String>, identity: Identity) {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.into(), identity);
    }

    /// Revokes a token.
    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TokenValidator for MockTokenValidator {
    async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(error) = self
            .force_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(error);
        }

        self.tokens
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
