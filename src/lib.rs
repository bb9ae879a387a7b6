//! Request logging and trace segment middleware for axum services.
//!
//! - [`observability`]: single-line log format with trace id, correlation ids
//!   and elapsed time, plus the per-request [`TransactionContext`]
//! - [`http`]: middleware opening one trace segment per request, and a
//!   traced outbound client
//! - [`trace`]: trace header parsing, segments and the segment client
//! - [`config`]: explicit configuration, from TOML and/or the environment

pub mod config;
pub mod http;
pub mod observability;
pub mod trace;

pub use config::MiddlewareConfig;
pub use http::{xray_middleware, TracedClient, XRayState};
pub use observability::{init_logging, TransactionContext};
