//! Bearer token verification and revocation state.
//!
//! [`JwtVerifier`] checks signature, expiry and issuer locally, then asks an
//! optional [`TokenStateStore`] whether the token has been revoked. A store
//! that cannot be reached fails the request closed.

mod store;
mod verifier;

#[cfg(feature = "redis")]
mod redis_store;

pub use store::{MemoryTokenStore, StoreError, TokenStateStore};
pub use verifier::{JwtSettings, JwtVerifier, TokenVerifier};

#[cfg(feature = "redis")]
pub use redis_store::{RedisSettings, RedisTokenStore};
