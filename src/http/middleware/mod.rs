//! Request pipeline middleware.

pub mod xray;

pub use xray::{xray_middleware, XRayState, RESPONSE_METADATA_KEY};
