//! Request metadata capture.
//!
//! # Responsibilities
//! - Derive the client address (first `X-Forwarded-For` hop, else the peer)
//! - Extract method, URL and user agent for the segment's request record
//! - Expose the segment and transaction context to downstream handlers
//!
//! # Design Decisions
//! - Header values that are not valid UTF-8 are treated as absent
//! - The segment lock is held only while the record is copied in

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::observability::TransactionContext;
use crate::trace::{RequestRecord, Segment};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// True when a non-empty `X-Forwarded-For` header is present.
pub fn has_x_forwarded_for(headers: &HeaderMap) -> bool {
    header_str(headers, X_FORWARDED_FOR).is_some()
}

/// First `X-Forwarded-For` entry, trimmed; otherwise `remote_addr` unchanged.
pub fn client_ip(headers: &HeaderMap, remote_addr: &str) -> String {
    match header_str(headers, X_FORWARDED_FOR) {
        Some(forwarded) => forwarded
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
        None => remote_addr.to_string(),
    }
}

/// Peer address recorded by `into_make_service_with_connect_info`, if any.
pub fn remote_addr<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

/// Host the request was addressed to.
pub fn request_host<B>(req: &Request<B>) -> String {
    header_str(req.headers(), header::HOST)
        .map(str::to_string)
        .or_else(|| req.uri().host().map(str::to_string))
        .unwrap_or_default()
}

/// Build the segment request record for an inbound request.
pub fn request_record<B>(req: &Request<B>, remote_addr: &str) -> RequestRecord {
    let headers = req.headers();
    RequestRecord {
        method: req.method().to_string(),
        url: req.uri().to_string(),
        client_ip: client_ip(headers, remote_addr),
        user_agent: header_str(headers, header::USER_AGENT)
            .unwrap_or_default()
            .to_string(),
        x_forwarded_for: has_x_forwarded_for(headers),
    }
}

/// Copy `record` onto the segment under its lock.
pub fn capture_request_data(segment: &Segment, record: RequestRecord) {
    segment.lock().http.request = record;
}

/// Accessors for the values the trace middleware attaches to a request.
pub trait TraceExt {
    /// Segment opened for this request.
    fn segment(&self) -> Option<&Arc<Segment>>;

    /// Logging context of this request.
    fn transaction(&self) -> Option<&TransactionContext>;
}

impl TraceExt for Request<Body> {
    fn segment(&self) -> Option<&Arc<Segment>> {
        self.extensions().get::<Arc<Segment>>()
    }

    fn transaction(&self) -> Option<&TransactionContext> {
        self.extensions().get::<TransactionContext>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{TraceClient, TraceHeader};

    #[test]
    fn test_client_ip_from_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, "1.2.3.4, 5.6.7.6".parse().unwrap());
        assert!(has_x_forwarded_for(&headers));
        assert_eq!(client_ip(&headers, "9.9.9.9:1234"), "1.2.3.4");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        assert!(!has_x_forwarded_for(&headers));
        assert_eq!(client_ip(&headers, "9.9.9.9:1234"), "9.9.9.9:1234");
    }

    #[test]
    fn test_request_record() {
        let mut req = Request::builder()
            .method("POST")
            .uri("/orders?id=7")
            .header(header::HOST, "api.example.com")
            .header(header::USER_AGENT, "curl/8.0")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));

        let record = request_record(&req, &remote_addr(&req));
        assert_eq!(record.method, "POST");
        assert_eq!(record.url, "/orders?id=7");
        assert_eq!(record.client_ip, "10.0.0.1:5555");
        assert_eq!(record.user_agent, "curl/8.0");
        assert!(!record.x_forwarded_for);
        assert_eq!(request_host(&req), "api.example.com");
    }

    #[test]
    fn test_capture_request_data() {
        let segment = TraceClient::default().begin_segment("orders", &TraceHeader::default());
        let record = RequestRecord {
            method: "GET".into(),
            ..Default::default()
        };
        capture_request_data(&segment, record.clone());
        assert_eq!(segment.lock().http.request, record);
    }
}
