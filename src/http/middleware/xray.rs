//! Trace segment middleware.
//! Opens one segment per request, propagates the trace header and records
//! the exchange on the segment.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{TracingConfig, ValidationError};
use crate::http::request::{capture_request_data, remote_addr, request_host, request_record};
use crate::http::response::{capture_response_data, BodyOutcome, TracedBody};
use crate::observability::TransactionContext;
use crate::trace::{namer_from_config, SegmentGuard, SegmentNamer, TraceClient, TraceHeader};

/// Metadata key holding the captured response body.
pub const RESPONSE_METADATA_KEY: &str = "response";

/// Shared state of the trace middleware.
#[derive(Debug, Clone)]
pub struct XRayState {
    header_name: HeaderName,
    capture_response_body: bool,
    client: TraceClient,
    namer: Arc<dyn SegmentNamer>,
}

impl XRayState {
    /// Build from configuration with the default client (sample everything,
    /// emit to the log).
    pub fn new(config: &TracingConfig) -> Result<Self, ValidationError> {
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes())
            .map_err(|_| ValidationError::InvalidHeaderName(config.header_name.clone()))?;
        Ok(Self {
            header_name,
            capture_response_body: config.capture_response_body,
            client: TraceClient::default(),
            namer: namer_from_config(config),
        })
    }

    pub fn with_client(mut self, client: TraceClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_namer(mut self, namer: Arc<dyn SegmentNamer>) -> Self {
        self.namer = namer;
        self
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub fn client(&self) -> &TraceClient {
        &self.client
    }
}

/// Middleware function for request tracing.
///
/// Install with `axum::middleware::from_fn_with_state(Arc<XRayState>, xray_middleware)`.
/// The response head is returned as soon as the handler produces it; the
/// segment is completed and closed once its body has been sent or dropped.
pub async fn xray_middleware(
    State(state): State<Arc<XRayState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let name = state.namer.name(&request_host(&req));
    let raw_header = req
        .headers()
        .get(&state.header_name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let trace_header = TraceHeader::parse(&raw_header);

    // Closes the segment on every exit, including panics and cancellation.
    let segment = SegmentGuard::new(state.client.begin_segment(&name, &trace_header));
    let trx = TransactionContext::new(segment.trace_id());
    trx.in_scope(|| info!("{}: {}", state.header_name.as_str(), raw_header));

    let record = request_record(&req, &remote_addr(&req));
    capture_request_data(&segment, record);
    let propagated = trace_header.response_value(segment.trace_id(), segment.sampled());

    req.extensions_mut().insert(segment.segment().clone());
    req.extensions_mut().insert(trx.clone());

    let response = trx.in_context(next.run(req)).await;
    let status = response.status().as_u16();
    let (mut parts, body) = response.into_parts();

    match HeaderValue::from_str(&propagated) {
        Ok(value) => {
            parts.headers.insert(state.header_name.clone(), value);
        }
        Err(_) => trx.in_scope(|| warn!("Cannot propagate trace header {:?}", propagated)),
    }

    let body = TracedBody::new(body, state.capture_response_body, move |outcome| {
        complete_segment(segment, &trx, status, outcome)
    });
    Response::from_parts(parts, Body::new(body))
}

/// Record the finished response on the segment, log the summary and close it.
fn complete_segment(
    segment: SegmentGuard,
    trx: &TransactionContext,
    status: u16,
    outcome: BodyOutcome,
) {
    trx.in_scope(|| {
        capture_response_data(&segment, status, outcome.bytes_sent);
        if let Some(e) = &outcome.error {
            error!("Error reading response body: {}", e);
            segment.lock().fault = true;
        }
        if let Some(bytes) = &outcome.captured {
            let captured = String::from_utf8_lossy(bytes);
            if let Err(e) = segment.add_metadata(RESPONSE_METADATA_KEY, captured.as_ref()) {
                error!("Error adding metadata to segment: {}", e);
            }
        }
        info!("Trace ID: {}", segment.trace_id());
        info!("Segment Name: {}", segment.name());
        debug!("Start Time: {}", segment.start_time());
        debug!("Metadata: {:?}", segment.lock().metadata);
    });
    segment.close();
}
