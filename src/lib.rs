//! # uiautodev
//!
//! Local backend for the uiautodev inspector: a streaming LLM chat proxy with
//! retrieval-augmented tool calling.
//!
//! ## Overview
//!
//! A chat request from the UI goes through:
//!
//! ```text
//! ChatRequest → PromptAssembler → ToolLoop ⇄ ModelBackend (SSE decode) → StreamEvent → SSE to the UI
//!                                    │
//!                                    └─ ToolCatalog → RetrievalClient (snippet search)
//! ```
//!
//! - **Streaming-first**: events reach the caller as the provider produces them
//! - **Always terminated**: every event stream ends with exactly one [`StreamEvent::EndOfStream`]
//! - **In-band errors**: request-time failures are [`StreamEvent::Error`] events, never panics or `Err`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use uiautodev::{ChatRequest, ChatService, ProviderKind, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> uiautodev::Result<()> {
//!     let service = ChatService::for_provider(ProviderKind::DeepSeek, "your-api-key")?;
//!
//!     let mut events = service.generate(ChatRequest::new("click the OK button"));
//!     while let Some(event) = events.next().await {
//!         match event {
//!             StreamEvent::ContentDelta(text) => print!("{}", text),
//!             StreamEvent::Error { message, .. } => eprintln!("error: {}", message),
//!             StreamEvent::EndOfStream => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Orchestrator, tool-call loop, model backends |
//! | [`prompt`] | Prompt assembly from request context |
//! | [`retrieval`] | Snippet search client and result formatting |
//! | [`pipeline`] | SSE decoding of provider responses |
//! | [`tools`] | Tool trait, catalog, built-in snippet search tool |
//! | [`drivers`] | Provider kinds and request payloads |
//! | [`server`] | axum HTTP surface |
//! | [`config`] | Service configuration |
//! | [`types`] | Core type definitions (messages, events, tools) |

pub mod client;
pub mod config;
pub mod drivers;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod server;
pub mod tools;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use client::{ChatService, ChatServiceBuilder, ModelBackend};
pub use config::ServiceConfig;
pub use drivers::ProviderKind;
pub use types::{
    ChatContext, ChatRequest, ChatTurn, ErrorKind, Role, StreamEvent, ToolCallRequest, Usage,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Normalized event stream for one exchange. Always ends with `EndOfStream`.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

/// Raw response body chunks from the provider.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = std::result::Result<bytes::Bytes, transport::TransportError>> + Send + 'static>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
