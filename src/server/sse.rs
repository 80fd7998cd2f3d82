//! Outbound SSE framing for the UI client.

use crate::types::StreamEvent;
use serde_json::{json, Value};

/// Encodes [`StreamEvent`]s as SSE frames.
///
/// Content deltas are bare `data:` frames carrying a JSON string. Every other
/// event is named. The end-of-stream message reflects whether an error was sent.
#[derive(Debug, Default)]
pub struct SseEncoder {
    saw_error: bool,
}

impl SseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, event: &StreamEvent) -> String {
        match event {
            StreamEvent::ContentDelta(text) => data_frame(&Value::String(text.clone())),
            StreamEvent::ToolRequest(calls) => named_frame("tool_request_details", &json!(calls)),
            StreamEvent::Usage(usage) => named_frame("usage_update", &json!(usage)),
            StreamEvent::Error {
                kind,
                message,
                status,
            } => {
                self.saw_error = true;
                let mut payload = json!({"error": message, "kind": kind.as_str()});
                if let Some(code) = status {
                    payload["status"] = json!(code);
                }
                named_frame("error", &payload)
            }
            StreamEvent::EndOfStream => {
                let message = if self.saw_error {
                    "Stream ended due to error"
                } else {
                    "Stream completed"
                };
                named_frame("end-of-stream", &json!({ "message": message }))
            }
        }
    }
}

fn data_frame(payload: &Value) -> String {
    format!("data: {}\n\n", payload)
}

fn named_frame(event: &str, payload: &Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, payload)
}
