//! # Types Module
//!
//! Core data model shared by the prompt assembler, the stream decoder and the
//! tool loop.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatTurn`] | One conversation entry (system, user, assistant, tool) |
//! | [`ToolCallRequest`] | Model-initiated function call with JSON-encoded arguments |
//! | [`ChatRequest`] | Inbound chat call: prompt, context, history, sampling overrides |
//! | [`ChatContext`] | Structured view over the UI's free-form context bag |
//! | [`StreamEvent`] | Normalized event emitted to the caller |
//! | [`ToolDefinition`] | Tool schema attached to provider requests |

pub mod events;
pub mod message;
pub mod request;
pub mod tool;

pub use events::{ErrorKind, StreamEvent, Usage};
pub use message::{ChatTurn, FunctionCall, MessageContent, Role, ToolCallRequest};
pub use request::{ChatContext, ChatRequest};
pub use tool::{FunctionDefinition, ToolChoice, ToolDefinition};
