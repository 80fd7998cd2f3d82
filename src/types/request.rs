//! Inbound chat request and its structured context record.

use super::message::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form UI context, reduced to the keys the prompt assembler understands.
///
/// Deserialization is lenient: unknown keys are ignored and a recognized key with
/// an unexpected JSON type is treated as absent, so a malformed context can never
/// reject a chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct ChatContext {
    /// From `selectedElement` (object or list) or `selectedElements` (list), in order
    #[serde(rename = "selectedElements", skip_serializing_if = "Vec::is_empty")]
    pub selected_elements: Vec<Value>,
    #[serde(rename = "uiHierarchy", skip_serializing_if = "Option::is_none")]
    pub ui_hierarchy: Option<Value>,
    #[serde(rename = "pythonConsoleOutput", skip_serializing_if = "Option::is_none")]
    pub python_console_output: Option<String>,
    #[serde(rename = "pythonLastErrorTraceback", skip_serializing_if = "Option::is_none")]
    pub python_last_error_traceback: Option<String>,
    #[serde(rename = "rag_code_snippets", skip_serializing_if = "Option::is_none")]
    pub rag_code_snippets: Option<String>,
    #[serde(rename = "pythonCode", skip_serializing_if = "Option::is_none")]
    pub python_code: Option<String>,
    #[serde(rename = "deviceInfo", skip_serializing_if = "Option::is_none")]
    pub device_info: Option<Value>,
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn non_null(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|v| !v.is_null()).cloned()
}

impl From<Map<String, Value>> for ChatContext {
    fn from(map: Map<String, Value>) -> Self {
        let mut selected_elements = Vec::new();
        for key in ["selectedElement", "selectedElements"] {
            match map.get(key) {
                Some(Value::Array(items)) => {
                    selected_elements.extend(items.iter().filter(|v| v.is_object()).cloned())
                }
                Some(v @ Value::Object(_)) => selected_elements.push(v.clone()),
                _ => {}
            }
        }

        Self {
            selected_elements,
            ui_hierarchy: map.get("uiHierarchy").filter(|v| v.is_object()).cloned(),
            python_console_output: string_field(&map, "pythonConsoleOutput"),
            python_last_error_traceback: string_field(&map, "pythonLastErrorTraceback"),
            rag_code_snippets: string_field(&map, "rag_code_snippets"),
            python_code: string_field(&map, "pythonCode"),
            device_info: non_null(&map, "deviceInfo"),
        }
    }
}

impl ChatContext {
    pub fn with_rag_snippets(mut self, snippets: impl Into<String>) -> Self {
        self.rag_code_snippets = Some(snippets.into());
        self
    }
}

/// One inbound chat call. Read-only once constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: ChatContext,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn context(mut self, context: ChatContext) -> Self {
        self.context = context;
        self
    }

    pub fn history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
