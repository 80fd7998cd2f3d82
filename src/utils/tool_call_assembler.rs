use crate::types::ToolCallRequest;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: Option<String>,
    call_type: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Collects streamed `delta.tool_calls` fragments into final tool calls.
///
/// Fragments are keyed by their positional `index`. `id`, `type` and function
/// `name` are set once (first non-empty value wins); `arguments` fragments are
/// concatenated in arrival order and are not valid JSON until the stream signals
/// completion.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: BTreeMap<u64, PartialToolCall>,
}

fn set_once(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            *slot = Some(v.to_string());
        }
    }
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Merge one `delta.tool_calls` array. Entries without an `index` fall back to
    /// their position in the array.
    pub fn on_delta(&mut self, tool_calls: &[Value]) {
        for (position, fragment) in tool_calls.iter().enumerate() {
            let index = fragment
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(position as u64);
            let entry = self.calls.entry(index).or_default();

            set_once(&mut entry.id, fragment.get("id").and_then(Value::as_str));
            set_once(
                &mut entry.call_type,
                fragment.get("type").and_then(Value::as_str),
            );
            if let Some(function) = fragment.get("function") {
                set_once(&mut entry.name, function.get("name").and_then(Value::as_str));
                if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                    entry.arguments.push_str(args);
                }
            }
        }
    }

    /// Arguments accumulated so far for `index`.
    pub fn arguments(&self, index: u64) -> Option<&str> {
        self.calls.get(&index).map(|c| c.arguments.as_str())
    }

    /// Consume the table, returning calls in index order.
    pub fn finalize(self) -> Vec<ToolCallRequest> {
        self.calls
            .into_iter()
            .map(|(index, c)| ToolCallRequest {
                id: c.id.unwrap_or_else(|| format!("call_{}", index)),
                call_type: c.call_type.unwrap_or_else(|| "function".to_string()),
                function: crate::types::FunctionCall {
                    name: c.name.unwrap_or_default(),
                    arguments: c.arguments,
                },
            })
            .collect()
    }

    /// Parse a fully-formed `message.tool_calls` list (terminal-chunk fallback).
    /// Non-string `arguments` are re-encoded as JSON text.
    pub fn from_complete(tool_calls: &[Value]) -> Vec<ToolCallRequest> {
        tool_calls
            .iter()
            .enumerate()
            .filter_map(|(i, tc)| {
                let function = tc.get("function")?;
                let name = function.get("name").and_then(Value::as_str)?.to_string();
                let arguments = match function.get("arguments") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Some(ToolCallRequest {
                    id: tc
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("call_{}", i)),
                    call_type: tc
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("function")
                        .to_string(),
                    function: crate::types::FunctionCall { name, arguments },
                })
            })
            .collect()
    }
}
