//! # Stream Decoder
//!
//! Turns one live provider response into a normalized [`StreamEvent`] stream.
//!
//! ```text
//! HTTP response → read timeout → decode (SSE lines) → event_map → StreamEvent
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Byte buffering and SSE line classification |
//! | [`event_map`] | Chunk JSON to events, tool-call fragment accumulation |
//!
//! Every stream produced here ends with exactly one `EndOfStream`, including on
//! a non-success status and on transport failure mid-stream. The stream is
//! single-pass over the live connection; dropping it releases the connection.

pub mod decode;
pub mod event_map;

use crate::transport::TransportError;
use crate::types::StreamEvent;
use crate::utils::text::head;
use crate::{ByteStream, EventStream};
use futures::{stream, StreamExt};
use std::time::Duration;
use tracing::warn;

pub use decode::{decode_lines, SseLine};
pub use event_map::{map_lines, network_error, ChunkEventMapper};

const MAX_ERROR_BODY_CHARS: usize = 1000;

/// Decode an SSE byte stream into events.
pub fn decode_event_stream(input: ByteStream) -> EventStream {
    Box::pin(map_lines(Box::pin(decode_lines(input))))
}

/// Bound every individual read on `input` by `read_timeout`.
///
/// An elapsed read yields [`TransportError::ReadTimeout`] once and ends the stream.
pub fn with_read_timeout(input: ByteStream, read_timeout: Duration) -> ByteStream {
    Box::pin(stream::unfold(Some(input), move |state| async move {
        let mut input = state?;
        match tokio::time::timeout(read_timeout, input.next()).await {
            Ok(Some(item)) => Some((item, Some(input))),
            Ok(None) => None,
            Err(_) => Some((Err(TransportError::ReadTimeout(read_timeout)), None)),
        }
    }))
}

/// Events for one provider response.
///
/// A non-success status short-circuits to `Error` (with status) and
/// `EndOfStream`; the body is read once for the message.
pub async fn from_response(response: reqwest::Response, read_timeout: Duration) -> EventStream {
    let status = response.status();
    if !status.is_success() {
        let body = match tokio::time::timeout(read_timeout, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => format!("<unreadable body: {}>", e),
            Err(_) => "<timed out reading body>".to_string(),
        };
        warn!(status = status.as_u16(), body = head(&body, 200), "LLM provider returned an error status");
        let message = upstream_error_message(status.as_u16(), &body);
        return Box::pin(stream::iter(vec![
            StreamEvent::upstream_error(status.as_u16(), message),
            StreamEvent::EndOfStream,
        ]));
    }

    let bytes: ByteStream = Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from)),
    );
    decode_event_stream(with_read_timeout(bytes, read_timeout))
}

/// Prefer a nested `error.message` from a JSON body, else the raw body.
pub fn upstream_error_message(status: u16, body: &str) -> String {
    let nested = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            err.get("message")
                .and_then(|m| m.as_str())
                .or_else(|| err.as_str())
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty());

    nested.unwrap_or_else(|| {
        format!(
            "LLM API Error ({}): {}",
            status,
            head(body.trim(), MAX_ERROR_BODY_CHARS)
        )
    })
}
