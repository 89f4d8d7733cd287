//! Response body capture.
//!
//! # Responsibilities
//! - Duplicate every data frame sent to the client into a per-request buffer
//! - Report the captured body, status and size once the response is finished
//!
//! # Design Decisions
//! - Only the body is decorated; status and headers reach the client untouched
//! - Buffer first, forward second: a frame that cannot be buffered is not sent
//! - The completion hook fires exactly once, on end of stream, error or drop

use std::collections::TryReserveError;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};

/// Error raised when a frame cannot be appended to the capture buffer.
#[derive(Debug, thiserror::Error)]
#[error("failed to buffer {len} response bytes for capture")]
pub struct CaptureError {
    len: usize,
    #[source]
    source: TryReserveError,
}

/// What the client was sent, as observed by the capture wrapper.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub size: usize,
    body: Bytes,
}

impl CapturedResponse {
    /// Bytes forwarded to the client, in order.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

type Completion = Box<dyn FnOnce(CapturedResponse) + Send>;

/// Body decorator that tees data frames into a buffer.
pub struct CaptureBody {
    inner: Body,
    status: StatusCode,
    buffer: Vec<u8>,
    size: usize,
    on_complete: Option<Completion>,
}

impl CaptureBody {
    /// Wrap `inner`, the body of a response sent with `status`.
    pub fn new(inner: Body, status: StatusCode) -> Self {
        Self {
            inner,
            status,
            buffer: Vec::new(),
            size: 0,
            on_complete: None,
        }
    }

    /// Register the hook that receives the captured response.
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(CapturedResponse) + Send + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Bytes captured so far.
    pub fn body(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes forwarded to the client so far.
    pub fn size(&self) -> usize {
        self.size
    }

    fn finish(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook(CapturedResponse {
                status: self.status,
                size: self.size,
                body: Bytes::from(std::mem::take(&mut self.buffer)),
            });
        }
    }
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    if let Err(source) = this.buffer.try_reserve(data.len()) {
                        let err = CaptureError {
                            len: data.len(),
                            source,
                        };
                        this.finish();
                        return Poll::Ready(Some(Err(axum::Error::new(err))));
                    }
                    this.buffer.extend_from_slice(data);
                    this.size += data.len();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Wrap the body of `response` so `hook` sees everything sent to the client.
pub fn capture_response<F>(response: axum::response::Response, hook: F) -> axum::response::Response
where
    F: FnOnce(CapturedResponse) + Send + 'static,
{
    let (parts, body) = response.into_parts();
    let body = CaptureBody::new(body, parts.status).on_complete(hook);
    axum::response::Response::from_parts(parts, Body::new(body))
}
