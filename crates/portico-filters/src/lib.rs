//! # Portico Filters
//!
//! Executable per-route filter chains.
//!
//! The router describes each route's chain declaratively as a list of
//! [`FilterStage`](portico_router::FilterStage)s. This crate compiles that
//! list into a [`FilterChain`] and runs requests through it:
//!
//! ```text
//! Request → headers → path → authenticate → authorize → transform → upstream
//!                                                                       ↓
//! Response ← headers ←──────────────────────────────── transform ←──────┘
//! ```
//!
//! Any stage may short-circuit with its own response. Authentication and
//! authorization failures never reach the backend.
//!
//! ## Example
//!
//! ```ignore
//! use portico_filters::{ChainResources, FilterChain, FilterContext};
//!
//! let chain = FilterChain::compile(rule, &ChainResources::new(verifier));
//! let mut ctx = FilterContext::new(request_id, rule.id());
//! let response = chain.run(&mut ctx, request, |_ctx, req| forward(req)).await;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-filters/0.1.0")]
#![warn(missing_docs)]

pub mod auth;
mod chain;
mod context;
mod filter;
pub mod stages;
mod types;

pub use chain::{ChainResources, FilterChain};
pub use context::FilterContext;
pub use filter::{BoxFuture, Filter, Next, Terminal};
pub use types::{Request, Response, ResponseExt};
