//! Trace segment subsystem.
//!
//! # Data Flow
//! ```text
//! inbound trace header
//!     → header.rs (parse Root / Parent / Sampled)
//!     → naming.rs (segment name from host)
//!     → client.rs (open segment, decide sampling)
//!     → segment.rs (record request/response, metadata, close once)
//!     → client.rs Emitter (closed, sampled segments)
//! ```
//!
//! # Design Decisions
//! - Segment identity is immutable; mutable state sits behind the segment's own lock
//! - Closing is idempotent, and `SegmentGuard` closes on every exit path
//! - Shipping segments to a collector is left to an `Emitter` implementation

pub mod client;
pub mod header;
pub mod id;
pub mod naming;
pub mod segment;

pub use client::{AlwaysSample, Emitter, FixedRateSampler, LogEmitter, MemoryEmitter, Sampler, TraceClient};
pub use header::{downstream_value, parse_header_map, SamplingDecision, TraceHeader};
pub use naming::{namer_from_config, DynamicSegmentNamer, FixedSegmentNamer, SegmentNamer};
pub use segment::{
    HttpRecord, RequestRecord, ResponseRecord, Segment, SegmentData, SegmentDocument, SegmentError,
    SegmentGuard, StatusFlags,
};
