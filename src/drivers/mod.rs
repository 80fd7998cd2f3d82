//! Provider drivers: chat-completions payload construction per provider.
//!
//! Both supported providers speak the OpenAI-compatible wire format. They differ
//! in endpoint, default model and whether the retrieval tool is attached
//! (DeepSeek runs the tool loop; OpenAI gets its snippets injected up front).

use crate::types::{ChatTurn, ToolChoice, ToolDefinition};
use crate::{Error, ErrorContext};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    DeepSeek,
    OpenAi,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::OpenAi => "OpenAI",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "https://api.deepseek.com/chat/completions",
            ProviderKind::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::OpenAi => "gpt-4.1-mini",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn model_env(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "DEEPSEEK_MODEL",
            ProviderKind::OpenAi => "OPENAI_MODEL",
        }
    }

    /// Whether the retrieval tool is offered to the model mid-conversation.
    pub fn supports_tool_loop(&self) -> bool {
        matches!(self, ProviderKind::DeepSeek)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(Error::configuration_with_context(
                format!("Unsupported provider: {}", other),
                ErrorContext::new()
                    .with_field_path("UIAUTODEV_LLM_PROVIDER")
                    .with_details("supported providers: deepseek, openai")
                    .with_source("drivers"),
            )),
        }
    }
}

/// Parameters for one streaming chat-completions call.
#[derive(Debug, Clone)]
pub struct ChatPayload<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatTurn],
    pub temperature: f64,
    pub max_tokens: u32,
    pub tools: &'a [ToolDefinition],
    pub tool_choice: Option<ToolChoice>,
    pub include_usage: bool,
}

impl ChatPayload<'_> {
    /// JSON body `{model, messages, stream: true, temperature, max_tokens, tools?, tool_choice?}`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
            "stream": true,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        if !self.tools.is_empty() {
            body["tools"] = json!(self.tools);
            body["tool_choice"] = json!(self.tool_choice.unwrap_or(ToolChoice::Auto));
        }
        if self.include_usage {
            body["stream_options"] = json!({"include_usage": true});
        }
        body
    }
}
