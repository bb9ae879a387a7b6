//! Traced outbound HTTP calls.
//!
//! # Responsibilities
//! - Record an outgoing call on an existing segment
//! - Propagate the trace context to the called service
//! - Log before and after the call
//!
//! # Design Decisions
//! - The segment is closed once the call returns, whatever the outcome
//! - The call's result is handed back untouched

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::sync::Arc;
use tracing::{error, info};

use crate::http::request::{capture_request_data, client_ip, has_x_forwarded_for};
use crate::http::response::capture_response_data;
use crate::observability::TransactionContext;
use crate::trace::{downstream_value, RequestRecord, Segment, SegmentGuard};

/// A `reqwest::Client` that reports each call on a segment.
#[derive(Debug, Clone)]
pub struct TracedClient {
    client: reqwest::Client,
    segment: Arc<Segment>,
    header_name: HeaderName,
}

fn outbound_record(request: &reqwest::Request) -> RequestRecord {
    let headers: &HeaderMap = request.headers();
    RequestRecord {
        method: request.method().to_string(),
        url: request.url().to_string(),
        client_ip: client_ip(headers, ""),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        x_forwarded_for: has_x_forwarded_for(headers),
    }
}

impl TracedClient {
    pub fn new(client: reqwest::Client, segment: Arc<Segment>, header_name: HeaderName) -> Self {
        Self {
            client,
            segment,
            header_name,
        }
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    /// Start building a GET request with the inner client.
    pub fn get(&self, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// Start building a POST request with the inner client.
    pub fn post(&self, url: impl reqwest::IntoUrl) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    /// Send `request`, recording it on the segment, then close the segment.
    ///
    /// Success is logged at info level, failure at error level.
    pub async fn execute(
        &self,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let segment = SegmentGuard::new(self.segment.clone());
        let trx = TransactionContext::new(segment.trace_id());
        trx.in_scope(|| info!("Sending request to {}", request.url()));

        capture_request_data(&segment, outbound_record(&request));
        let context = downstream_value(segment.trace_id(), segment.id(), segment.sampled());
        if let Ok(value) = HeaderValue::from_str(&context) {
            request.headers_mut().insert(self.header_name.clone(), value);
        }

        let result = trx.in_context(self.client.execute(request)).await;

        match &result {
            Ok(response) => {
                capture_response_data(
                    &segment,
                    response.status().as_u16(),
                    response.content_length().unwrap_or(0),
                );
                trx.in_scope(|| info!("Received response {}", response.status()));
            }
            Err(e) => trx.in_scope(|| error!("Error: {}", e)),
        }

        segment.close();
        result
    }
}
