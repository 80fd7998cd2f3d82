//! Chat client: provider backends, the tool-call loop and the completion orchestrator.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod backend;
pub mod builder;
pub mod core;
pub mod tool_loop;

pub use backend::{HttpModelBackend, ModelBackend, SamplingParams};
pub use builder::ChatServiceBuilder;
pub use core::ChatService;
pub use tool_loop::{LoopState, ToolLoop};
