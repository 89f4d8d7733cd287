//! Request body peeking.
//!
//! The logger reads at most `limit` bytes from the front of a request body.
//! Downstream receives a body that yields those bytes first and then whatever
//! was left unread, so handlers always see the body the client sent.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};

type Queued = Result<Frame<Bytes>, axum::Error>;

/// Request body split into the part seen by the logger and the body handed on.
pub struct Peeked {
    /// At most `limit` bytes from the start of the body.
    pub logged: Bytes,
    /// The body was longer than `limit`.
    pub truncated: bool,
    /// Message of the error that stopped reading, if any.
    pub read_error: Option<String>,
    /// Full body for downstream, including any read error in its original position.
    pub body: Body,
}

/// Read up to `limit` bytes of `body` without consuming it for downstream.
pub async fn peek(mut body: Body, limit: usize) -> Peeked {
    let mut head = BytesMut::new();
    let mut queued: VecDeque<Queued> = VecDeque::new();
    let mut read_error = None;
    let mut complete = false;

    while head.len() <= limit {
        match poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => head.extend_from_slice(&data),
                Err(trailers) => {
                    queued.push_back(Ok(trailers));
                    break;
                }
            },
            Some(Err(err)) => {
                read_error = Some(err.to_string());
                queued.push_back(Err(err));
                break;
            }
            None => {
                complete = true;
                break;
            }
        }
    }

    let head = head.freeze();
    let truncated = head.len() > limit;
    let logged = head.slice(..head.len().min(limit));

    let body = if complete {
        Body::from(head)
    } else {
        if !head.is_empty() {
            queued.push_front(Ok(Frame::data(head)));
        }
        let rest = if read_error.is_some() { None } else { Some(body) };
        Body::new(ReplayBody { queued, rest })
    };

    Peeked {
        logged,
        truncated,
        read_error,
        body,
    }
}

/// Yields already-read frames, then the unread remainder of the original body.
struct ReplayBody {
    queued: VecDeque<Queued>,
    rest: Option<Body>,
}

impl ReplayBody {
    fn queued_len(&self) -> u64 {
        self.queued
            .iter()
            .filter_map(|frame| frame.as_ref().ok())
            .filter_map(Frame::data_ref)
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if let Some(frame) = this.queued.pop_front() {
            return Poll::Ready(Some(frame));
        }
        match this.rest.as_mut() {
            Some(rest) => Pin::new(rest).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.queued.is_empty() && self.rest.as_ref().map_or(true, |rest| rest.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        let queued = self.queued_len();
        match &self.rest {
            None => SizeHint::with_exact(queued),
            Some(rest) => {
                let inner = rest.size_hint();
                let mut hint = SizeHint::new();
                hint.set_lower(inner.lower().saturating_add(queued));
                if let Some(upper) = inner.upper() {
                    hint.set_upper(upper.saturating_add(queued));
                }
                hint
            }
        }
    }
}
