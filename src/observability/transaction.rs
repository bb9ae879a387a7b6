//! Per-request logging context.

use std::future::Future;
use tracing::instrument::Instrumented;
use tracing::{field, Instrument, Span};

use crate::observability::fields::{EMAIL_REQUEST_FIELD, PARTNER_REQUEST_FIELD};

/// Log context shared by every log call made while serving one request.
///
/// Backed by an info-level `transaction` span carrying the trace id and the
/// start time, so the formatter can tag lines and compute elapsed time.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    trace_id: String,
    start_time_ms: i64,
    span: Span,
}

impl TransactionContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        let start_time_ms = chrono::Utc::now().timestamp_millis();
        let span = tracing::info_span!(
            "transaction",
            TRACEID = %trace_id,
            STARTTIME = start_time_ms,
            EMAILREQ = field::Empty,
            MITRAREQ = field::Empty
        );
        Self {
            trace_id,
            start_time_ms,
            span,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Creation time, epoch milliseconds.
    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    /// Milliseconds since creation, never negative.
    pub fn elapsed_ms(&self) -> i64 {
        (chrono::Utc::now().timestamp_millis() - self.start_time_ms).max(0)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Tag subsequent lines with an e-mail request id.
    pub fn record_email_request(&self, id: &str) {
        self.span.record(EMAIL_REQUEST_FIELD, id);
    }

    /// Tag subsequent lines with a partner request id.
    pub fn record_partner_request(&self, id: &str) {
        self.span.record(PARTNER_REQUEST_FIELD, id);
    }

    /// Run `f` with this context active.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    /// Attach this context to a future.
    pub fn in_context<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(self.span.clone())
    }
}
