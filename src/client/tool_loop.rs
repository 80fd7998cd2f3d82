//! Tool-call loop controller.
//!
//! ```text
//! AwaitingModel --tool_request--> ExecutingTools --> AwaitingModel (tool_choice = none)
//!       |                                                   ...
//!       +--end_of_stream--> Done        iteration budget spent --> Aborted
//! ```
//!
//! Tools run sequentially in the order the model requested them. The caller
//! receives exactly one `EndOfStream`, after everything else.

use super::backend::ModelBackend;
use crate::tools::ToolCatalog;
use crate::types::{ChatTurn, ErrorKind, StreamEvent, ToolCallRequest, ToolChoice};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools,
    /// The model answered without requesting tools
    Done,
    /// The model kept requesting tools past the iteration budget
    Aborted,
    /// An upstream call reported an error
    Failed,
    /// The caller went away before the exchange finished
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::AwaitingModel | LoopState::ExecutingTools)
    }
}

#[derive(Debug)]
pub struct ToolLoop {
    messages: Vec<ChatTurn>,
    catalog: ToolCatalog,
    max_iterations: usize,
    force_direct_answer: bool,
    state: LoopState,
    upstream_calls: usize,
    tool_executions: usize,
}

impl ToolLoop {
    pub fn new(messages: Vec<ChatTurn>, catalog: ToolCatalog, max_iterations: usize) -> Self {
        Self {
            messages,
            catalog,
            max_iterations: max_iterations.max(1),
            force_direct_answer: true,
            state: LoopState::AwaitingModel,
            upstream_calls: 0,
            tool_executions: 0,
        }
    }

    /// Whether the call after a tool round forces `tool_choice = "none"`.
    pub fn force_direct_answer(mut self, enable: bool) -> Self {
        self.force_direct_answer = enable;
        self
    }

    pub fn messages(&self) -> &[ChatTurn] {
        &self.messages
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn upstream_calls(&self) -> usize {
        self.upstream_calls
    }

    pub fn tool_executions(&self) -> usize {
        self.tool_executions
    }

    /// Drive the exchange to a terminal state, sending caller-visible events to `tx`.
    pub async fn drive<B>(&mut self, backend: &B, tx: &mpsc::Sender<StreamEvent>) -> LoopState
    where
        B: ModelBackend + ?Sized,
    {
        let tools = self.catalog.definitions();
        let mut tool_choice = ToolChoice::Auto;

        let mut iteration = 0usize;
        loop {
            self.state = LoopState::AwaitingModel;
            self.upstream_calls += 1;
            let choice = (!tools.is_empty()).then_some(tool_choice);
            let opened = tokio::select! {
                ev = backend.stream_chat(&self.messages, &tools, choice) => Some(ev),
                _ = tx.closed() => None,
            };
            let Some(mut events) = opened else {
                return self.cancelled();
            };

            let mut partial = String::new();
            let mut requested: Vec<ToolCallRequest> = Vec::new();
            loop {
                let next = tokio::select! {
                    ev = events.next() => ev,
                    _ = tx.closed() => return self.cancelled(),
                };
                match next {
                    Some(StreamEvent::ContentDelta(text)) => {
                        partial.push_str(&text);
                        if !emit(tx, StreamEvent::ContentDelta(text)).await {
                            return self.cancelled();
                        }
                    }
                    Some(StreamEvent::ToolRequest(calls)) => {
                        requested.extend(calls.iter().cloned());
                        if !emit(tx, StreamEvent::ToolRequest(calls)).await {
                            return self.cancelled();
                        }
                    }
                    Some(ev @ StreamEvent::Usage(_)) => {
                        if !emit(tx, ev).await {
                            return self.cancelled();
                        }
                    }
                    Some(ev @ StreamEvent::Error { .. }) => {
                        warn!(iteration, "upstream call failed; ending exchange");
                        return self.finish(tx, LoopState::Failed, Some(ev)).await;
                    }
                    Some(StreamEvent::EndOfStream) | None => break,
                }
            }
            drop(events);

            if requested.is_empty() {
                info!(
                    upstream_calls = self.upstream_calls,
                    tool_executions = self.tool_executions,
                    "exchange complete"
                );
                return self.finish(tx, LoopState::Done, None).await;
            }

            if iteration + 1 >= self.max_iterations {
                warn!(
                    max_iterations = self.max_iterations,
                    "model still requesting tools; aborting"
                );
                let err = StreamEvent::error(
                    ErrorKind::LoopLimit,
                    format!(
                        "Tool-call loop limit reached: the model requested tools on {} consecutive calls (max_iterations = {})",
                        self.upstream_calls, self.max_iterations
                    ),
                );
                return self.finish(tx, LoopState::Aborted, Some(err)).await;
            }

            self.state = LoopState::ExecutingTools;
            self.messages
                .push(ChatTurn::assistant_tool_calls(Some(partial), requested.clone()));
            for call in &requested {
                let output = tokio::select! {
                    out = self.catalog.execute(call) => Some(out),
                    _ = tx.closed() => None,
                };
                let Some(output) = output else {
                    return self.cancelled();
                };
                self.tool_executions += 1;
                self.messages.push(ChatTurn::tool_result(
                    call.id.clone(),
                    call.function.name.clone(),
                    output,
                ));
            }

            if self.force_direct_answer {
                tool_choice = ToolChoice::None;
            }
            iteration += 1;
        }
    }

    async fn finish(
        &mut self,
        tx: &mpsc::Sender<StreamEvent>,
        state: LoopState,
        error: Option<StreamEvent>,
    ) -> LoopState {
        self.state = state;
        if let Some(err) = error {
            if !emit(tx, err).await {
                return self.cancelled();
            }
        }
        if !emit(tx, StreamEvent::EndOfStream).await {
            return self.cancelled();
        }
        state
    }

    fn cancelled(&mut self) -> LoopState {
        info!(upstream_calls = self.upstream_calls, "caller disconnected; cancelling exchange");
        self.state = LoopState::Cancelled;
        self.state
    }
}

async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}
