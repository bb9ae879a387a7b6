//! Segment factory with pluggable sampling and emission.

use rand::Rng;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::trace::header::{SamplingDecision, TraceHeader};
use crate::trace::id::{new_segment_id, new_trace_id};
use crate::trace::segment::{Segment, SegmentDocument, SegmentInit};

/// Receives every sampled segment once it is closed.
pub trait Emitter: Send + Sync {
    fn emit(&self, segment: &SegmentDocument);
}

/// Writes closed segments as JSON at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmitter;

impl Emitter for LogEmitter {
    fn emit(&self, segment: &SegmentDocument) {
        match serde_json::to_string(segment) {
            Ok(json) => tracing::debug!("Segment closed: {}", json),
            Err(e) => tracing::warn!("Failed to encode segment {}: {}", segment.id, e),
        }
    }
}

/// Keeps closed segments in memory.
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    documents: Mutex<Vec<SegmentDocument>>,
}

impl MemoryEmitter {
    /// Copy of everything emitted so far, in close order.
    pub fn documents(&self) -> Vec<SegmentDocument> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&self, segment: &SegmentDocument) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(segment.clone());
    }
}

/// Decides sampling for requests that arrive without a decision.
pub trait Sampler: Send + Sync {
    fn should_sample(&self, segment_name: &str) -> bool;
}

/// Samples everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSample;

impl Sampler for AlwaysSample {
    fn should_sample(&self, _segment_name: &str) -> bool {
        true
    }
}

/// Samples a fixed fraction of requests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateSampler {
    rate: f64,
}

impl FixedRateSampler {
    /// `rate` is clamped to `0.0..=1.0`; NaN samples nothing.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }
}

impl Sampler for FixedRateSampler {
    fn should_sample(&self, _segment_name: &str) -> bool {
        rand::thread_rng().gen_bool(self.rate)
    }
}

/// Opens segments, continuing inbound traces when a context is present.
#[derive(Clone)]
pub struct TraceClient {
    sampler: Arc<dyn Sampler>,
    emitter: Arc<dyn Emitter>,
}

impl fmt::Debug for TraceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceClient").finish_non_exhaustive()
    }
}

impl Default for TraceClient {
    fn default() -> Self {
        Self::new(Arc::new(AlwaysSample), Arc::new(LogEmitter))
    }
}

impl TraceClient {
    pub fn new(sampler: Arc<dyn Sampler>, emitter: Arc<dyn Emitter>) -> Self {
        Self { sampler, emitter }
    }

    /// Start a segment, or continue the trace described by `header`.
    ///
    /// Without a `Root` a fresh trace id is generated and the segment has no
    /// parent. An explicit `Sampled=0|1` wins; otherwise the sampler decides.
    pub fn begin_segment(&self, name: &str, header: &TraceHeader) -> Arc<Segment> {
        let (trace_id, request_was_traced) = match &header.root {
            Some(root) => (root.clone(), true),
            None => (new_trace_id(), false),
        };
        let sampled = match header.sampled {
            SamplingDecision::Sampled => true,
            SamplingDecision::NotSampled => false,
            SamplingDecision::Requested | SamplingDecision::Unknown => {
                self.sampler.should_sample(name)
            }
        };

        let segment = Segment::new(
            SegmentInit {
                id: new_segment_id(),
                name: name.to_string(),
                trace_id,
                parent_id: header.parent.clone(),
                sampled,
                request_was_traced,
            },
            self.emitter.clone(),
        );
        tracing::trace!(
            "Segment opened: id={} trace_id={} sampled={}",
            segment.id(),
            segment.trace_id(),
            sampled
        );
        Arc::new(segment)
    }
}
