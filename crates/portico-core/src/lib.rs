//! # Portico Core
//!
//! Core types shared by every Portico crate.
//!
//! - [`ServiceCatalog`] - Normalized backend service descriptors
//! - [`RoleRegistry`] - The admin, seller and member role groups
//! - [`AuthContext`] - Verified request identity
//! - [`RequestId`] - UUID v7 request identifier
//! - [`GatewayError`] - Request and configuration error taxonomy
//! - [`BodyTransformer`] - Synchronous response body rewrite hook

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod catalog;
mod error;
mod identity;
mod request_id;
mod roles;
mod transform;

pub use catalog::{ServiceCatalog, ServiceDescriptor, DEFAULT_SERVICE_SUFFIX};
pub use error::{
    AuthFailureReason, ErrorDetail, ErrorEnvelope, ErrorKind, GatewayError, GatewayResult,
};
pub use identity::AuthContext;
pub use request_id::RequestId;
pub use roles::{RoleGroup, RoleRegistry, RoleSet};
pub use transform::BodyTransformer;
