//! HTTP request/response tracing.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware/xray.rs (segment name, trace header, open segment)
//!     → request.rs (method, URL, client IP, user agent onto the segment)
//!     → downstream handlers (inside the transaction span)
//!     → response header with propagated trace context, head returned
//!     → response.rs (tee body frames to the client and a buffer)
//!     → body finished or dropped: status, length, flags, metadata, segment closed
//!
//! Outbound call
//!     → client.rs (record request, propagate context, send, record response, close)
//! ```

pub mod client;
pub mod middleware;
pub mod request;
pub mod response;

pub use client::TracedClient;
pub use middleware::{xray_middleware, XRayState};
pub use request::TraceExt;
