//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling produces:
//!     → transaction.rs (per-request span: TRACEID, STARTTIME)
//!     → tracing events (info!, warn!, ...)
//!
//! Subscriber stack (logging.rs):
//!     → fields.rs (recognized span fields kept in span extensions)
//!     → format.rs (one text line per event)
//!     → writer (stdout, or CaptureWriter in tests)
//! ```
//!
//! # Design Decisions
//! - Only the recognized context fields are rendered; other fields are dropped
//! - Elapsed time is computed when a line is formatted, not when it is logged
//! - Configuration is captured when the subscriber is built

pub mod fields;
pub mod format;
pub mod logging;
pub mod transaction;

pub use fields::{LogFields, LogFieldsLayer};
pub use format::{LogLineFormat, LogRecord};
pub use logging::{build_subscriber, init_logging, CaptureWriter};
pub use transaction::TransactionContext;
