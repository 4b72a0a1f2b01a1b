//! Response body transformation hook.

use crate::error::GatewayResult;
use bytes::Bytes;
use std::fmt;

/// A synchronous rewrite applied to a fully buffered response body.
///
/// Implementations report failures instead of recovering from them; the
/// caller decides whether to fall back to the original body.
pub trait BodyTransformer: Send + Sync + fmt::Debug {
    /// Short name used in logs and route listings.
    fn name(&self) -> &'static str;

    /// Rewrites `body`.
    fn transform(&self, body: &[u8]) -> GatewayResult<Bytes>;
}
