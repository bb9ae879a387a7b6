//! Trace segments.
//!
//! A segment records one unit of work: its identity, timing, the HTTP
//! exchange it observed, error classification and free-form metadata.
//! Identity is fixed at creation; everything else sits behind the segment's
//! own mutex and is only touched through short [`Segment::lock`] scopes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::trace::client::Emitter;

/// Errors raised while mutating a segment.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment {0} is already closed")]
    Closed(String),

    #[error("metadata value for {key:?} is not serializable: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Request half of the HTTP sub-record.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RequestRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub x_forwarded_for: bool,
}

/// Response half of the HTTP sub-record.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResponseRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub content_length: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HttpRecord {
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

/// Error classification derived from a response status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub error: bool,
    pub throttle: bool,
    pub fault: bool,
}

impl StatusFlags {
    /// 4xx is an error, 429 additionally a throttle, 5xx a fault.
    ///
    /// The checks are independent, so 429 sets both `error` and `throttle`.
    pub fn from_status(status: u16) -> Self {
        Self {
            error: (400..500).contains(&status),
            throttle: status == 429,
            fault: (500..600).contains(&status),
        }
    }
}

/// Mutable part of a segment.
#[derive(Debug, Default)]
pub struct SegmentData {
    pub http: HttpRecord,
    pub error: bool,
    pub throttle: bool,
    pub fault: bool,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub end_time: Option<f64>,
}

impl SegmentData {
    /// Record the response and OR its classification into the flags.
    pub fn apply_response(&mut self, status: u16, content_length: u64) {
        self.http.response.status = Some(status);
        self.http.response.content_length = content_length;

        let flags = StatusFlags::from_status(status);
        self.error |= flags.error;
        self.throttle |= flags.throttle;
        self.fault |= flags.fault;
    }
}

/// One traced unit of work.
pub struct Segment {
    id: String,
    name: String,
    trace_id: String,
    parent_id: Option<String>,
    sampled: bool,
    request_was_traced: bool,
    start_time: f64,
    data: Mutex<SegmentData>,
    closed: AtomicBool,
    emitter: Arc<dyn Emitter>,
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("trace_id", &self.trace_id)
            .field("parent_id", &self.parent_id)
            .field("sampled", &self.sampled)
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) struct SegmentInit {
    pub id: String,
    pub name: String,
    pub trace_id: String,
    pub parent_id: Option<String>,
    pub sampled: bool,
    pub request_was_traced: bool,
}

pub(crate) fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl Segment {
    pub(crate) fn new(init: SegmentInit, emitter: Arc<dyn Emitter>) -> Self {
        Self {
            id: init.id,
            name: init.name,
            trace_id: init.trace_id,
            parent_id: init.parent_id,
            sampled: init.sampled,
            request_was_traced: init.request_was_traced,
            start_time: epoch_seconds(),
            data: Mutex::new(SegmentData::default()),
            closed: AtomicBool::new(false),
            emitter,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// True when the trace id came from an inbound header.
    pub fn request_was_traced(&self) -> bool {
        self.request_was_traced
    }

    /// Start time in epoch seconds.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// End time in epoch seconds, once closed.
    pub fn end_time(&self) -> Option<f64> {
        self.lock().end_time
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lock the mutable part. Keep the guard short lived and never hold it
    /// across an `.await`.
    ///
    /// A poisoned lock is recovered: every field is valid on its own, so a
    /// panic mid-update cannot leave the data unusable.
    pub fn lock(&self) -> MutexGuard<'_, SegmentData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `value` under `key`, replacing any previous value.
    pub fn add_metadata<T: Serialize>(&self, key: &str, value: T) -> Result<(), SegmentError> {
        if self.is_closed() {
            return Err(SegmentError::Closed(self.id.clone()));
        }
        let value = serde_json::to_value(value).map_err(|source| SegmentError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.lock().metadata.insert(key.to_string(), value);
        Ok(())
    }

    /// Close the segment and hand it to the emitter.
    ///
    /// Only the first call has an effect and returns `true`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let document = {
            let mut data = self.lock();
            data.end_time = Some(epoch_seconds().max(self.start_time));
            self.document(&data)
        };
        if self.sampled {
            self.emitter.emit(&document);
        }
        true
    }

    /// Serializable snapshot of the current state.
    pub fn snapshot(&self) -> SegmentDocument {
        let data = self.lock();
        self.document(&data)
    }

    fn document(&self, data: &SegmentData) -> SegmentDocument {
        let mut metadata = BTreeMap::new();
        if !data.metadata.is_empty() {
            metadata.insert("default".to_string(), data.metadata.clone());
        }
        SegmentDocument {
            name: self.name.clone(),
            id: self.id.clone(),
            trace_id: self.trace_id.clone(),
            parent_id: self.parent_id.clone(),
            start_time: self.start_time,
            end_time: data.end_time,
            in_progress: data.end_time.is_none(),
            http: data.http.clone(),
            error: data.error,
            throttle: data.throttle,
            fault: data.fault,
            metadata,
        }
    }
}

/// Wire shape of a segment as handed to an [`Emitter`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentDocument {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub in_progress: bool,
    pub http: HttpRecord,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub throttle: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fault: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Closes its segment when dropped.
///
/// Holding the guard across the downstream call guarantees the segment is
/// closed on normal return, on panic unwinding and when the request future
/// is dropped mid-flight.
#[derive(Debug)]
pub struct SegmentGuard {
    segment: Arc<Segment>,
}

impl SegmentGuard {
    pub fn new(segment: Arc<Segment>) -> Self {
        Self { segment }
    }

    /// Shared handle to the guarded segment.
    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }
}

impl Deref for SegmentGuard {
    type Target = Segment;

    fn deref(&self) -> &Segment {
        &self.segment
    }
}

impl Drop for SegmentGuard {
    fn drop(&mut self) {
        self.segment.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::client::MemoryEmitter;

    fn segment(emitter: Arc<MemoryEmitter>, sampled: bool) -> Segment {
        Segment::new(
            SegmentInit {
                id: "53995c3f42cd8ad8".into(),
                name: "orders".into(),
                trace_id: "1-5759e988-bd862e3fe1be46a994272793".into(),
                parent_id: None,
                sampled,
                request_was_traced: false,
            },
            emitter,
        )
    }

    #[test]
    fn test_status_flags() {
        assert_eq!(
            StatusFlags::from_status(404),
            StatusFlags { error: true, throttle: false, fault: false }
        );
        assert_eq!(
            StatusFlags::from_status(429),
            StatusFlags { error: true, throttle: true, fault: false }
        );
        assert_eq!(
            StatusFlags::from_status(503),
            StatusFlags { error: false, throttle: false, fault: true }
        );
        assert_eq!(StatusFlags::from_status(200), StatusFlags::default());
        assert_eq!(StatusFlags::from_status(600), StatusFlags::default());
    }

    #[test]
    fn test_close_once() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = segment(emitter.clone(), true);

        assert!(seg.close());
        assert!(!seg.close());
        assert!(seg.is_closed());
        assert!(seg.end_time().unwrap() >= seg.start_time());
        assert_eq!(emitter.documents().len(), 1);
    }

    #[test]
    fn test_unsampled_segment_not_emitted() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = segment(emitter.clone(), false);
        assert!(seg.close());
        assert!(emitter.documents().is_empty());
    }

    #[test]
    fn test_metadata_after_close_fails() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = segment(emitter, true);
        seg.add_metadata("response", "ok").unwrap();
        seg.close();

        let err = seg.add_metadata("late", 1).unwrap_err();
        assert!(matches!(err, SegmentError::Closed(_)));
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = Arc::new(segment(emitter.clone(), true));
        {
            let _guard = SegmentGuard::new(seg.clone());
        }
        assert!(seg.is_closed());
        assert_eq!(emitter.documents().len(), 1);
    }

    #[test]
    fn test_guard_closes_on_panic() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = Arc::new(segment(emitter.clone(), true));
        let inner = seg.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = SegmentGuard::new(inner);
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert!(seg.is_closed());
        assert_eq!(emitter.documents().len(), 1);
    }

    #[test]
    fn test_document_shape() {
        let emitter = Arc::new(MemoryEmitter::default());
        let seg = segment(emitter.clone(), true);
        seg.lock().apply_response(429, 12);
        seg.add_metadata("response", "slow down").unwrap();
        seg.close();

        let doc = serde_json::to_value(&emitter.documents()[0]).unwrap();
        assert_eq!(doc["name"], "orders");
        assert_eq!(doc["http"]["response"]["status"], 429);
        assert_eq!(doc["error"], true);
        assert_eq!(doc["throttle"], true);
        assert!(doc.get("fault").is_none());
        assert!(doc.get("parent_id").is_none());
        assert_eq!(doc["metadata"]["default"]["response"], "slow down");
    }
}
