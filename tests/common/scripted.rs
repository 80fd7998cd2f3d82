//! Scripted model backend and recording tool for tool-loop tests

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uiautodev::client::ModelBackend;
use uiautodev::tools::Tool;
use uiautodev::types::{ChatTurn, StreamEvent, ToolCallRequest, ToolChoice, ToolDefinition};
use uiautodev::EventStream;

/// One recorded upstream call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatTurn>,
    pub tool_count: usize,
    pub tool_choice: Option<ToolChoice>,
}

/// Plays back one scripted turn per call; once the script runs out, `repeat` is
/// replayed forever (or a bare end of stream if none is set).
#[derive(Default)]
pub struct ScriptedBackend {
    turns: Mutex<VecDeque<Vec<StreamEvent>>>,
    repeat: Option<Vec<StreamEvent>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            ..Default::default()
        }
    }

    pub fn repeating(turn: Vec<StreamEvent>) -> Self {
        Self {
            repeat: Some(turn),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn stream_chat(
        &self,
        messages: &[ChatTurn],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> EventStream {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_count: tools.len(),
            tool_choice,
        });
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .unwrap_or_else(|| vec![StreamEvent::EndOfStream]);
        Box::pin(stream::iter(turn))
    }
}

/// Backend whose upstream never answers the initial request
pub struct StalledBackend;

#[async_trait]
impl ModelBackend for StalledBackend {
    async fn stream_chat(
        &self,
        _messages: &[ChatTurn],
        _tools: &[ToolDefinition],
        _tool_choice: Option<ToolChoice>,
    ) -> EventStream {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Box::pin(stream::empty())
    }
}

/// Tool that records the arguments it was invoked with
pub struct RecordingTool {
    name: String,
    pub invocations: Arc<Mutex<Vec<Value>>>,
}

impl RecordingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.name.clone(),
            "Records its arguments",
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        )
    }

    async fn invoke(&self, arguments: &Value) -> String {
        self.invocations.lock().unwrap().push(arguments.clone());
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or("");
        format!("snippets for {}", query)
    }
}

pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

pub fn content_turn(text: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::ContentDelta(text.to_string()),
        StreamEvent::EndOfStream,
    ]
}

pub fn tool_turn(prefix: Option<&str>, calls: Vec<ToolCallRequest>) -> Vec<StreamEvent> {
    let mut turn = Vec::new();
    if let Some(text) = prefix {
        turn.push(StreamEvent::ContentDelta(text.to_string()));
    }
    turn.push(StreamEvent::ToolRequest(calls));
    turn.push(StreamEvent::EndOfStream);
    turn
}
