//! Server-sent-event framing for the streaming answer endpoint.
//!
//! Answer fragments produced by the assistant are wrapped one-to-one into
//! SSE frames and flushed immediately; nothing is buffered across fragments,
//! so a slow consumer still sees each fragment as it lands. The stream ends
//! with exactly one `data: [DONE]\n\n` frame whether production succeeded or
//! failed partway, so a client never waits indefinitely. The single
//! exception is consumer disconnect: production just stops, and no error
//! frame is written into a connection nobody is reading.

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::AskError;

/// One unit of the outbound token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An answer fragment.
    Content(String),
    /// A production failure, reported inline before the terminal frame.
    Error(String),
    /// Terminal marker; always the last frame of a stream.
    Done,
}

impl StreamEvent {
    /// Render the SSE wire frame for this event.
    pub fn frame(&self) -> String {
        match self {
            StreamEvent::Content(content) => {
                format!("data: {}\n\n", serde_json::json!({ "content": content }))
            }
            StreamEvent::Error(error) => {
                format!("data: {}\n\n", serde_json::json!({ "error": error }))
            }
            StreamEvent::Done => "data: [DONE]\n\n".to_string(),
        }
    }
}

/// Terminate the event stream according to how production ended.
///
/// - success: the terminal frame;
/// - failure: one error frame, then the terminal frame;
/// - cancellation: nothing. The consumer is gone, and cancellation is the
///   caller's signal, not an error to report.
pub async fn finish(tx: &mpsc::Sender<StreamEvent>, outcome: Result<(), AskError>) {
    match outcome {
        Ok(()) => {
            let _ = tx.send(StreamEvent::Done).await;
        }
        Err(AskError::Cancelled) => {}
        Err(AskError::Failed(error)) => {
            eprintln!("warning: streaming answer failed: {:#}", error);
            let _ = tx
                .send(StreamEvent::Error(
                    "An error occurred while processing your question.".to_string(),
                ))
                .await;
            let _ = tx.send(StreamEvent::Done).await;
        }
    }
}

/// Build the SSE response around a stream of events.
///
/// Each event becomes its own body chunk, which hyper writes out as it is
/// produced. Dropping the response body (client disconnect) closes the
/// receiver, which producers observe as a send failure at their next yield
/// point.
pub fn sse_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let frames =
        ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(Bytes::from(event.frame())));

    let mut response = Response::new(Body::from_stream(frames));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
