//! Event mapping (SSE data lines -> StreamEvent)
//!
//! Maps OpenAI-compatible `chat.completion.chunk` payloads into [`StreamEvent`]s.
//! Streamed tool-call fragments are accumulated until the turn signals
//! completion. `EndOfStream` is emitted exactly once, as the last event.

use super::decode::SseLine;
use crate::transport::TransportError;
use crate::types::{ErrorKind, StreamEvent, Usage};
use crate::utils::ToolCallAssembler;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Stateful chunk mapper for one upstream call.
#[derive(Debug, Default)]
pub struct ChunkEventMapper {
    assembler: ToolCallAssembler,
    ended: bool,
}

impl ChunkEventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `EndOfStream` has been produced.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Map one `data:` payload. Malformed payloads are logged and yield nothing.
    pub fn on_data(&mut self, payload: &str) -> Vec<StreamEvent> {
        if self.ended {
            return Vec::new();
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(chunk) => self.on_chunk(&chunk),
            Err(e) => {
                warn!(error = %e, payload = crate::utils::text::head(payload, 200), "skipping malformed stream chunk");
                Vec::new()
            }
        }
    }

    pub fn on_chunk(&mut self, chunk: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        let usage = chunk.get("usage").filter(|u| u.is_object());
        if let Some(raw) = usage {
            match serde_json::from_value::<Usage>(raw.clone()) {
                Ok(u) => out.push(StreamEvent::Usage(u)),
                Err(e) => warn!(error = %e, "ignoring unparseable usage block"),
            }
        }

        let Some(choice) = chunk
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            if usage.is_none() {
                warn!("skipping stream chunk without choices");
            }
            return out;
        };

        let delta = choice.get("delta");
        if let Some(content) = delta.and_then(|d| d.get("content")).and_then(|c| c.as_str()) {
            out.push(StreamEvent::ContentDelta(content.to_string()));
        }
        if let Some(fragments) = delta
            .and_then(|d| d.get("tool_calls"))
            .and_then(|t| t.as_array())
        {
            self.assembler.on_delta(fragments);
        }

        match choice.get("finish_reason").and_then(|f| f.as_str()) {
            Some("tool_calls") => {
                let calls = if self.assembler.is_empty() {
                    choice
                        .get("message")
                        .and_then(|m| m.get("tool_calls"))
                        .and_then(|t| t.as_array())
                        .map(|t| ToolCallAssembler::from_complete(t))
                        .unwrap_or_default()
                } else {
                    std::mem::take(&mut self.assembler).finalize()
                };
                if calls.is_empty() {
                    warn!("finish_reason=tool_calls without any tool calls");
                } else {
                    debug!(count = calls.len(), "tool calls finalized");
                    out.push(StreamEvent::ToolRequest(calls));
                }
            }
            Some(reason) => debug!(finish_reason = reason, "choice finished"),
            None => {}
        }

        out
    }

    /// Close the turn: flush tool calls still pending, then `EndOfStream`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.ended {
            return Vec::new();
        }
        self.ended = true;
        let mut out = Vec::new();
        if !self.assembler.is_empty() {
            let calls = std::mem::take(&mut self.assembler).finalize();
            debug!(count = calls.len(), "tool calls finalized at end of stream");
            out.push(StreamEvent::ToolRequest(calls));
        }
        out.push(StreamEvent::EndOfStream);
        out
    }

    /// Terminate on a transport failure: `Error` then `EndOfStream`.
    pub fn fail(&mut self, error: &TransportError) -> Vec<StreamEvent> {
        if self.ended {
            return Vec::new();
        }
        self.ended = true;
        vec![network_error(error), StreamEvent::EndOfStream]
    }
}

/// Network-category error event for a transport failure.
pub fn network_error(error: &TransportError) -> StreamEvent {
    let message = if error.is_timeout() {
        format!("Network timeout contacting LLM provider: {}", error)
    } else {
        format!("Network issue contacting LLM provider: {}", error)
    };
    StreamEvent::error(ErrorKind::Network, message)
}

/// Map decoded lines into events until `[DONE]`, EOF or a transport error.
pub fn map_lines<S>(lines: S) -> impl Stream<Item = StreamEvent> + Send
where
    S: Stream<Item = Result<SseLine, TransportError>> + Send + Unpin,
{
    stream::unfold(
        (lines, ChunkEventMapper::new(), VecDeque::<StreamEvent>::new()),
        |(mut lines, mut mapper, mut pending)| async move {
            loop {
                if let Some(ev) = pending.pop_front() {
                    return Some((ev, (lines, mapper, pending)));
                }
                if mapper.is_ended() {
                    return None;
                }

                match lines.next().await {
                    Some(Ok(SseLine::Data(payload))) => pending.extend(mapper.on_data(&payload)),
                    Some(Ok(SseLine::Done)) => pending.extend(mapper.finish()),
                    Some(Err(e)) => {
                        warn!(error = %e, "upstream stream failed");
                        pending.extend(mapper.fail(&e));
                    }
                    None => {
                        warn!("upstream stream closed without [DONE]");
                        pending.extend(mapper.finish());
                    }
                }
            }
        },
    )
}
