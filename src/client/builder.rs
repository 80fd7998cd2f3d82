use super::backend::ModelBackend;
use super::core::ChatService;
use crate::config::ServiceConfig;
use crate::drivers::ProviderKind;
use crate::prompt::PromptAssembler;
use crate::retrieval::RetrievalClient;
use crate::tools::{RagSearchTool, Tool, ToolCatalog};
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Builder for [`ChatService`].
pub struct ChatServiceBuilder {
    config: Option<ServiceConfig>,
    /// Override the provider URL (primarily for testing with mock servers)
    api_url_override: Option<String>,
    backend: Option<Arc<dyn ModelBackend>>,
    extra_tools: Vec<Arc<dyn Tool>>,
    rag_tool: bool,
}

impl Default for ChatServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            api_url_override: None,
            backend: None,
            extra_tools: Vec::new(),
            rag_tool: true,
        }
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Send provider calls to `url` instead of the configured endpoint.
    pub fn api_url_override(mut self, url: impl Into<String>) -> Self {
        self.api_url_override = Some(url.into());
        self
    }

    /// Use a custom model backend instead of the HTTP provider.
    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Offer an additional tool to the model.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    /// Whether the built-in snippet search tool is offered (default: true).
    pub fn rag_tool(mut self, enable: bool) -> Self {
        self.rag_tool = enable;
        self
    }

    pub fn build(self) -> Result<ChatService> {
        let mut config = match self.config {
            Some(c) => c,
            None => ServiceConfig::from_env()?,
        };
        if let Some(url) = self.api_url_override {
            url::Url::parse(&url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid provider URL: {}", e),
                    ErrorContext::new()
                        .with_field_path("api_url")
                        .with_details(url.clone())
                        .with_source("builder"),
                )
            })?;
            config.api_url = url;
        }

        let transport = HttpTransport::streaming(config.request_timeout, config.api_key.clone())?;
        let retrieval = RetrievalClient::new(config.rag_search_url.clone(), config.rag_timeout)?;

        let mut catalog = ToolCatalog::new();
        if self.rag_tool {
            catalog = catalog.with_tool(Arc::new(RagSearchTool::new(
                retrieval.clone(),
                config.rag_top_k,
            )));
        }
        for tool in self.extra_tools {
            catalog = catalog.with_tool(tool);
        }

        let assembler = PromptAssembler::new(config.system_prompt_override.clone(), config.prompt.clone());

        Ok(ChatService {
            config: Arc::new(config),
            transport,
            retrieval,
            assembler: Arc::new(assembler),
            catalog,
            backend: self.backend,
        })
    }
}

impl ChatService {
    pub fn builder() -> ChatServiceBuilder {
        ChatServiceBuilder::new()
    }

    /// Service for `provider` with defaults and the given API key.
    pub fn for_provider(provider: ProviderKind, api_key: impl Into<String>) -> Result<Self> {
        ChatServiceBuilder::new()
            .config(ServiceConfig::new(provider).with_api_key(api_key))
            .build()
    }
}
