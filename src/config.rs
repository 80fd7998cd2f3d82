//! Service configuration, built once at start-up and shared read-only.
//!
//! Everything configurable comes from the environment (see [`ServiceConfig::from_env`]).
//! Request-handling code never reads the environment itself; it receives an
//! `Arc<ServiceConfig>` from the server.

use crate::drivers::ProviderKind;
use crate::{Error, ErrorContext, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RAG_SEARCH_URL: &str = "http://localhost:8000/search";

/// Prompt assembly bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptLimits {
    /// Console output is tail-truncated to this many chars
    pub console_tail_chars: usize,
    /// The critical error traceback is head+tail truncated to this many chars
    pub traceback_max_chars: usize,
    /// At most this many selected elements are described
    pub max_selected_elements: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            console_tail_chars: 1000,
            traceback_max_chars: 6000,
            max_selected_elements: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    /// `None` means retrieval is not configured
    pub rag_search_url: Option<String>,
    pub request_timeout: Duration,
    pub rag_timeout: Duration,
    pub rag_top_k: usize,
    pub max_tool_iterations: usize,
    /// Force `tool_choice = "none"` on the call following a tool round
    pub force_direct_answer_after_tools: bool,
    pub include_usage: bool,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    pub system_prompt_override: Option<String>,
    pub prompt: PromptLimits,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ServiceConfig {
    /// Defaults for `provider`, without an API key.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            api_key: None,
            model: provider.default_model().to_string(),
            api_url: provider.api_url().to_string(),
            rag_search_url: Some(DEFAULT_RAG_SEARCH_URL.to_string()),
            request_timeout: Duration::from_secs(120),
            rag_timeout: Duration::from_secs(15),
            rag_top_k: 5,
            max_tool_iterations: 3,
            force_direct_answer_after_tools: true,
            include_usage: false,
            default_temperature: 0.7,
            default_max_tokens: 2048,
            system_prompt_override: None,
            prompt: PromptLimits::default(),
            host: "127.0.0.1".to_string(),
            port: 20242,
            log_level: "info".to_string(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_rag_search_url(mut self, url: Option<String>) -> Self {
        self.rag_search_url = url;
        self
    }

    pub fn with_max_tool_iterations(mut self, n: usize) -> Self {
        self.max_tool_iterations = n.max(1);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `UIAUTODEV_LLM_PROVIDER` (`deepseek` | `openai`, default `deepseek`)
    /// - `DEEPSEEK_API_KEY` / `OPENAI_API_KEY`, `DEEPSEEK_MODEL` / `OPENAI_MODEL`
    /// - `UIAUTODEV_LLM_API_URL`, `COCOINDEX_SEARCH_API_URL`
    /// - `UIAUTODEV_LLM_TIMEOUT_SECS`, `UIAUTODEV_RAG_TIMEOUT_SECS`, `UIAUTODEV_RAG_TOP_K`
    /// - `UIAUTODEV_MAX_TOOL_ITERATIONS`, `UIAUTODEV_FORCE_DIRECT_ANSWER`, `UIAUTODEV_INCLUDE_USAGE`
    /// - `UIAUTODEV_HOST`, `UIAUTODEV_PORT`, `UIAUTODEV_LOG_LEVEL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let provider = match get("UIAUTODEV_LLM_PROVIDER") {
            Some(p) if !p.is_empty() => p.parse::<ProviderKind>()?,
            _ => ProviderKind::DeepSeek,
        };
        let mut cfg = Self::new(provider);

        cfg.api_key = get(provider.api_key_env()).filter(|k| !k.is_empty());
        if let Some(model) = get(provider.model_env()).filter(|m| !m.is_empty()) {
            cfg.model = model;
        }
        if let Some(url) = get("UIAUTODEV_LLM_API_URL").filter(|u| !u.is_empty()) {
            validate_url("UIAUTODEV_LLM_API_URL", &url)?;
            cfg.api_url = url;
        }
        if let Some(url) = get("COCOINDEX_SEARCH_API_URL") {
            cfg.rag_search_url = if url.is_empty() {
                None
            } else {
                validate_url("COCOINDEX_SEARCH_API_URL", &url)?;
                Some(url)
            };
        }

        if let Some(secs) = parse_var::<u64>(&get, "UIAUTODEV_LLM_TIMEOUT_SECS")? {
            cfg.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_var::<u64>(&get, "UIAUTODEV_RAG_TIMEOUT_SECS")? {
            cfg.rag_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(k) = parse_var::<usize>(&get, "UIAUTODEV_RAG_TOP_K")? {
            cfg.rag_top_k = k.max(1);
        }
        if let Some(n) = parse_var::<usize>(&get, "UIAUTODEV_MAX_TOOL_ITERATIONS")? {
            cfg.max_tool_iterations = n.max(1);
        }
        if let Some(v) = get("UIAUTODEV_FORCE_DIRECT_ANSWER") {
            cfg.force_direct_answer_after_tools = parse_flag(&v);
        }
        if let Some(v) = get("UIAUTODEV_INCLUDE_USAGE") {
            cfg.include_usage = parse_flag(&v);
        }

        if let Some(host) = get("UIAUTODEV_HOST").filter(|h| !h.is_empty()) {
            cfg.host = host;
        }
        if let Some(port) = parse_var::<u16>(&get, "UIAUTODEV_PORT")? {
            cfg.port = port;
        }
        if let Some(level) = get("UIAUTODEV_LOG_LEVEL").filter(|l| !l.is_empty()) {
            cfg.log_level = level.to_lowercase();
        }

        Ok(cfg)
    }

    /// Base URL of the retrieval service as exposed to the UI (`/search` stripped).
    pub fn rag_api_base_url(&self) -> Option<String> {
        self.rag_search_url.as_ref().map(|u| {
            u.strip_suffix("/search")
                .unwrap_or(u.as_str())
                .to_string()
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid value for {}: {}", key, e),
                ErrorContext::new()
                    .with_field_path(key)
                    .with_details(raw)
                    .with_source("config"),
            )
        }),
    }
}

fn validate_url(key: &str, raw: &str) -> Result<()> {
    url::Url::parse(raw).map(|_| ()).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid URL for {}: {}", key, e),
            ErrorContext::new()
                .with_field_path(key)
                .with_details(raw)
                .with_source("config"),
        )
    })
}
