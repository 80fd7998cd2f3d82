//! Normalized streaming events produced by the decoder and the tool loop

use super::message::ToolCallRequest;
use serde::{Deserialize, Serialize};

/// Token usage counters reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    /// Provider-specific counters (cache hits, reasoning tokens, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Error category carried by [`StreamEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing API key or service URL; detected before any network call
    Configuration,
    /// Non-success HTTP status from the provider
    UpstreamHttp,
    /// Timeout, connection reset and other transport failures
    Network,
    /// The model kept requesting tools past the iteration budget
    LoopLimit,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::UpstreamHttp => "upstream_http",
            ErrorKind::Network => "network",
            ErrorKind::LoopLimit => "loop_limit",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Unified streaming event.
///
/// `EndOfStream` is always the last event of a stream. `Error` is only ever
/// followed by `EndOfStream`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text fragment; an empty string is a valid zero-length delta
    ContentDelta(String),
    /// Finalized tool calls for the current model turn
    ToolRequest(Vec<ToolCallRequest>),
    Usage(Usage),
    Error {
        kind: ErrorKind,
        message: String,
        status: Option<u16>,
    },
    EndOfStream,
}

impl StreamEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn upstream_error(status: u16, message: impl Into<String>) -> Self {
        StreamEvent::Error {
            kind: ErrorKind::UpstreamHttp,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, StreamEvent::EndOfStream)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error { .. })
    }
}
