//! Tests for traced outbound calls.

use axum::{http::HeaderMap, routing::get, Router};
use reqwest::header::HeaderName;
use std::sync::Arc;
use xray_mid::trace::{AlwaysSample, MemoryEmitter, TraceClient, TraceHeader};
use xray_mid::TracedClient;

mod common;

use common::{spawn_server, TRACE_HEADER};

/// Backend that echoes the trace header it received.
async fn echo_trace(headers: HeaderMap) -> String {
    headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn client_for(emitter: Arc<MemoryEmitter>, inbound: &str) -> TracedClient {
    let traces = TraceClient::new(Arc::new(AlwaysSample), emitter);
    let segment = traces.begin_segment("orders", &TraceHeader::parse(inbound));
    TracedClient::new(
        reqwest::Client::new(),
        segment,
        HeaderName::from_static(TRACE_HEADER),
    )
}

#[tokio::test]
async fn test_outbound_call_recorded_and_closed() {
    let backend = spawn_server(Router::new().route("/invoices", get(echo_trace))).await;
    let emitter = Arc::new(MemoryEmitter::default());
    let client = client_for(emitter.clone(), "Root=1-67891233-abcdef012345678912345678");

    let request = client
        .get(format!("http://{backend}/invoices"))
        .header("User-Agent", "orders/1.0")
        .build()
        .unwrap();
    let response = client.execute(request).await.unwrap();
    assert_eq!(response.status(), 200);

    let segment = client.segment().clone();
    let received = response.text().await.unwrap();
    assert_eq!(
        received,
        format!(
            "Root=1-67891233-abcdef012345678912345678;Parent={};Sampled=1",
            segment.id()
        )
    );

    assert!(segment.is_closed());
    let docs = emitter.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].http.request.method, "GET");
    assert_eq!(docs[0].http.request.url, format!("http://{backend}/invoices"));
    assert_eq!(docs[0].http.request.user_agent, "orders/1.0");
    assert_eq!(docs[0].http.response.status, Some(200));
    assert_eq!(docs[0].http.response.content_length, received.len() as u64);
}

#[tokio::test]
async fn test_outbound_error_still_closes_segment() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let emitter = Arc::new(MemoryEmitter::default());
    let client = client_for(emitter.clone(), "");
    let request = client.get(format!("http://{addr}/")).build().unwrap();

    let err = client.execute(request).await.unwrap_err();
    assert!(err.is_connect());

    assert!(client.segment().is_closed());
    let docs = emitter.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].http.response.status, None);
    assert_eq!(docs[0].http.request.url, format!("http://{addr}/"));
}

#[tokio::test]
async fn test_second_call_does_not_reemit() {
    let backend = spawn_server(Router::new().route("/invoices", get(echo_trace))).await;
    let emitter = Arc::new(MemoryEmitter::default());
    let client = client_for(emitter.clone(), "");

    for _ in 0..2 {
        let request = client
            .get(format!("http://{backend}/invoices"))
            .build()
            .unwrap();
        client.execute(request).await.unwrap();
    }

    assert_eq!(emitter.documents().len(), 1);
}
