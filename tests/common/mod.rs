//! Shared utilities for integration tests.

use axum::{
    body::{Body, Bytes},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use futures_util::{stream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use xray_mid::config::TracingConfig;
use xray_mid::trace::{AlwaysSample, MemoryEmitter, SegmentDocument, TraceClient};
use xray_mid::{xray_middleware, TransactionContext, XRayState};

pub const TRACE_HEADER: &str = "x-amzn-trace-id";

/// Middleware state whose closed segments land in the returned emitter.
pub fn traced_state(config: &TracingConfig) -> (Arc<XRayState>, Arc<MemoryEmitter>) {
    let emitter = Arc::new(MemoryEmitter::default());
    let client = TraceClient::new(Arc::new(AlwaysSample), emitter.clone());
    let state = XRayState::new(config).unwrap().with_client(client);
    (Arc::new(state), emitter)
}

async fn hello(Extension(trx): Extension<TransactionContext>) -> String {
    tracing::info!("handling request");
    format!("hello {}", trx.trace_id())
}

async fn throttled() -> impl IntoResponse {
    (StatusCode::TOO_MANY_REQUESTS, "slow down")
}

async fn unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "down")
}

async fn explode() -> &'static str {
    panic!("handler failure");
}

/// One chunk, then a stream that never finishes.
async fn stream_forever() -> Body {
    let first = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"first"))]);
    Body::from_stream(first.chain(stream::pending()))
}

/// One chunk, then a read error.
async fn broken_body() -> Body {
    Body::from_stream(stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "backend reset")),
    ]))
}

/// Router with a few fixed-status routes behind the trace middleware.
pub fn app(state: Arc<XRayState>) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/throttled", get(throttled))
        .route("/unavailable", get(unavailable))
        .route("/explode", get(explode))
        .route("/stream", get(stream_forever))
        .route("/broken", get(broken_body))
        .layer(axum::middleware::from_fn_with_state(state, xray_middleware))
}

/// Serve `router` on an ephemeral port, with peer addresses recorded.
#[allow(dead_code)]
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Documents emitted so far, waiting briefly for `count` of them.
///
/// A served response is completed by the server after its last byte is
/// written, which can trail the client reading it.
#[allow(dead_code)]
pub async fn wait_for_documents(emitter: &MemoryEmitter, count: usize) -> Vec<SegmentDocument> {
    for _ in 0..100 {
        let documents = emitter.documents();
        if documents.len() >= count {
            return documents;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    emitter.documents()
}
