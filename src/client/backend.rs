//! Model backends: one streaming chat-completions call per invocation.

use crate::drivers::ChatPayload;
use crate::pipeline;
use crate::transport::{HttpTransport, TransportError};
use crate::types::{ChatTurn, StreamEvent, ToolChoice, ToolDefinition};
use crate::EventStream;
use async_trait::async_trait;
use futures::stream;
use std::time::Duration;
use tracing::{debug, info};

/// A source of model turns.
///
/// Every returned stream ends with exactly one `EndOfStream`. Failures are
/// reported in-band as `Error` followed by `EndOfStream`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[ChatTurn],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> EventStream;
}

/// Sampling parameters for one chat request.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub include_usage: bool,
}

/// OpenAI-compatible provider reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpModelBackend {
    transport: HttpTransport,
    api_url: String,
    params: SamplingParams,
    request_timeout: Duration,
    request_id: Option<String>,
}

impl HttpModelBackend {
    pub fn new(
        transport: HttpTransport,
        api_url: impl Into<String>,
        params: SamplingParams,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
            params,
            request_timeout,
            request_id: None,
        }
    }

    /// Forward a client request id to the provider as `x-uiautodev-request-id`.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    fn failed(error: &TransportError) -> EventStream {
        Box::pin(stream::iter(vec![
            pipeline::network_error(error),
            StreamEvent::EndOfStream,
        ]))
    }
}

#[async_trait]
impl ModelBackend for HttpModelBackend {
    async fn stream_chat(
        &self,
        messages: &[ChatTurn],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> EventStream {
        let body = ChatPayload {
            model: &self.params.model,
            messages,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            tools,
            tool_choice,
            include_usage: self.params.include_usage,
        }
        .to_json();

        info!(
            model = %self.params.model,
            messages = messages.len(),
            tools = tools.len(),
            tool_choice = ?tool_choice,
            "streaming request to LLM provider"
        );
        debug!(url = %self.api_url, "provider endpoint");

        let send = self
            .transport
            .post_event_stream(&self.api_url, &body, self.request_id.as_deref());
        let response = match tokio::time::timeout(self.request_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Self::failed(&e),
            Err(_) => return Self::failed(&TransportError::ReadTimeout(self.request_timeout)),
        };

        pipeline::from_response(response, self.request_timeout).await
    }
}
