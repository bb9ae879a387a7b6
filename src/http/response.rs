//! Response metadata capture.
//!
//! # Responsibilities
//! - Tee the response body: forward every frame, copy data frames aside
//! - Report the outcome once the body is finished, failed or abandoned
//! - Record status and content length, classify the status
//!
//! # Design Decisions
//! - Frames reach the client as the handler produces them; streaming
//!   responses are never held back
//! - The size hint is forwarded so a known `Content-Length` survives
//! - Completion runs exactly once, from the last poll or from `Drop`

use axum::body::{Body, Bytes};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::trace::Segment;

/// Record status and length and raise the error/throttle/fault flags.
pub fn capture_response_data(segment: &Segment, status: u16, content_length: u64) {
    segment.lock().apply_response(status, content_length);
}

/// What a [`TracedBody`] saw by the time it finished.
#[derive(Debug, Default)]
pub struct BodyOutcome {
    /// Data bytes forwarded to the client.
    pub bytes_sent: u64,
    /// Copy of the forwarded bytes, when capture was enabled.
    pub captured: Option<Bytes>,
    /// Error raised by the inner body, if any.
    pub error: Option<String>,
}

type OnComplete = Box<dyn FnOnce(BodyOutcome) + Send + 'static>;

/// Response body wrapper that forwards frames unchanged and reports a
/// [`BodyOutcome`] when the stream ends, fails or is dropped.
pub struct TracedBody {
    inner: Body,
    captured: Option<Vec<u8>>,
    bytes_sent: u64,
    on_complete: Option<OnComplete>,
}

impl TracedBody {
    pub fn new(
        inner: Body,
        capture: bool,
        on_complete: impl FnOnce(BodyOutcome) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            captured: capture.then(Vec::new),
            bytes_sent: 0,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self, error: Option<String>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(BodyOutcome {
                bytes_sent: self.bytes_sent,
                captured: self.captured.take().map(Bytes::from),
                error,
            });
        }
    }
}

impl fmt::Debug for TracedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedBody")
            .field("bytes_sent", &self.bytes_sent)
            .field("capturing", &self.captured.is_some())
            .field("completed", &self.on_complete.is_none())
            .finish()
    }
}

impl HttpBody for TracedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes_sent += data.len() as u64;
                    if let Some(buffer) = this.captured.as_mut() {
                        buffer.extend_from_slice(data);
                    }
                }
            }
            Poll::Ready(Some(Err(e))) => this.complete(Some(e.to_string())),
            Poll::Ready(None) => this.complete(None),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TracedBody {
    fn drop(&mut self) {
        self.complete(None);
    }
}
