//! Authentication adapters.
//!
//! Implementations of the `TokenValidator` port:
//!
//! - `jwt` - HS256 shared-secret JWT validation for production
//! - `mock` - Test implementation that maps opaque tokens to identities

mod jwt;
mod mock;

pub use jwt::{BusClaims, JwtTokenValidator};
pub use mock::MockTokenValidator;
