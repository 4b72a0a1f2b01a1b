//! Executable filter stages.
//!
//! Each [`FilterStage`](portico_router::FilterStage) variant compiles to one
//! of these:
//!
//! | Stage | Filter |
//! |-------|--------|
//! | `AddHeader` | [`AddResponseHeaders`] (consecutive stages merged) |
//! | `RewritePath` | [`RewritePathFilter`] |
//! | `StripPrefix` | [`StripPrefixFilter`] |
//! | `Authenticate` | [`AuthenticateFilter`] |
//! | `Authorize` | [`AuthorizeFilter`] |
//! | `TransformResponseBody` | [`TransformBodyFilter`] |

mod authenticate;
mod authorize;
mod headers;
mod path;
mod transform;

pub use authenticate::{bearer_token, AuthenticateFilter, AUTH_SUBJECT_HEADER};
pub use authorize::{evaluate, AuthorizeFilter, PolicyDecision};
pub use headers::AddResponseHeaders;
pub use path::{RewritePathFilter, StripPrefixFilter};
pub use transform::{TransformBodyFilter, DEFAULT_MAX_BODY_BYTES};
