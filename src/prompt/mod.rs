//! # Prompt Assembler
//!
//! Builds the provider message list for one chat turn:
//!
//! ```text
//! [system] + history (unchanged) + [user: context sections..., "## User Request:\n<prompt>"]
//! ```
//!
//! Sections appear in a fixed order and only when present and non-empty:
//! retrieved snippets, critical traceback, selected elements, hierarchy summary,
//! console tail, editor code, device info. Assembly never fails.

use crate::config::PromptLimits;
use crate::retrieval;
use crate::types::{ChatContext, ChatTurn};
use crate::utils::text::{tail, truncate_middle};
use serde_json::{Map, Value};

/// Built-in instruction text for the assistant.
pub const SYSTEM_PROMPT: &str = include_str!("system_prompt.txt");

const TRACEBACK_MARKER: &str = "\n... [traceback truncated] ...\n";

const ELEMENT_PROPERTIES: &[&str] = &[
    "resource-id",
    "text",
    "content-desc",
    "class",
    "package",
    "clickable",
    "enabled",
];

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
    limits: PromptLimits,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(None, PromptLimits::default())
    }
}

impl PromptAssembler {
    pub fn new(system_override: Option<String>, limits: PromptLimits) -> Self {
        Self {
            system_prompt: system_override
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| SYSTEM_PROMPT.trim_end().to_string()),
            limits,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Messages for one turn: exactly one system message first, then `history`
    /// in order, then the user message.
    pub fn assemble(&self, prompt: &str, context: &ChatContext, history: &[ChatTurn]) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages.push(ChatTurn::user(self.user_content(prompt, context)));
        messages
    }

    /// Text of the current user message.
    pub fn user_content(&self, prompt: &str, context: &ChatContext) -> String {
        let mut sections = self.context_sections(context);
        sections.push(format!("## User Request:\n{}", prompt));
        sections.join("\n\n")
    }

    fn context_sections(&self, ctx: &ChatContext) -> Vec<String> {
        let mut sections = Vec::new();

        if let Some(snippets) = ctx
            .rag_code_snippets
            .as_deref()
            .filter(|s| retrieval::has_snippets(s))
        {
            sections.push(format!(
                "## Retrieved uiautomator2 Code Snippets:\n{}",
                snippets.trim()
            ));
        }

        let traceback = non_blank(ctx.python_last_error_traceback.as_deref());
        if let Some(tb) = traceback {
            let bounded = truncate_middle(tb, self.limits.traceback_max_chars, TRACEBACK_MARKER);
            sections.push(format!(
                "## Critical: Last Python Error Traceback:\n```text\n{}\n```",
                bounded
            ));
        }

        if let Some(section) = self.selected_elements_section(&ctx.selected_elements) {
            sections.push(section);
        }

        if let Some(hier) = ctx.ui_hierarchy.as_ref().filter(|v| !is_empty_value(v)) {
            sections.push(hierarchy_summary(hier));
        }

        if let Some(console) = non_blank(ctx.python_console_output.as_deref()) {
            let duplicated = traceback.map(|tb| console.contains(tb.trim())).unwrap_or(false);
            if !duplicated {
                let n = self.limits.console_tail_chars;
                sections.push(format!(
                    "## Recent Python Console Output (last {} chars):\n```\n{}\n```",
                    n,
                    tail(console, n)
                ));
            }
        }

        if let Some(code) = non_blank(ctx.python_code.as_deref()) {
            sections.push(format!(
                "## Current Python Code in Editor:\n```python\n{}\n```",
                code
            ));
        }

        if let Some(info) = ctx.device_info.as_ref().filter(|v| !is_empty_value(v)) {
            sections.push(format!("## Device Info:\n```json\n{}\n```", pretty(info)));
        }

        sections
    }

    fn selected_elements_section(&self, elements: &[Value]) -> Option<String> {
        let reduced: Vec<Value> = elements
            .iter()
            .take(self.limits.max_selected_elements)
            .map(reduce_element)
            .collect();

        match reduced.as_slice() {
            [] => None,
            [one] => Some(format!("## Selected UI Element:\n```json\n{}\n```", pretty(one))),
            many => Some(format!(
                "## Selected UI Elements ({} shown):\n```json\n{}\n```",
                many.len(),
                pretty(&Value::Array(many.to_vec()))
            )),
        }
    }
}

/// Keep only identifying element fields and a whitelist of properties.
fn reduce_element(element: &Value) -> Value {
    let mut out = Map::new();
    if let Some(name) = element.get("name").filter(|v| !v.is_null()) {
        out.insert("name".to_string(), name.clone());
    }

    let properties: Map<String, Value> = element
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter(|(k, _)| ELEMENT_PROPERTIES.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    out.insert("properties".to_string(), Value::Object(properties));

    for key in ["rect", "generatedXPath"] {
        if let Some(v) = element.get(key).filter(|v| !v.is_null()) {
            out.insert(key.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

fn hierarchy_summary(hier: &Value) -> String {
    let root = hier.get("name").and_then(Value::as_str).unwrap_or("N/A");
    let children = hier
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    format!(
        "## UI Hierarchy: Root element is '{}' with {} direct children.",
        root, children
    )
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}
