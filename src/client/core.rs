use super::backend::{HttpModelBackend, ModelBackend, SamplingParams};
use super::tool_loop::{LoopState, ToolLoop};
use crate::config::ServiceConfig;
use crate::prompt::PromptAssembler;
use crate::retrieval::RetrievalClient;
use crate::tools::ToolCatalog;
use crate::transport::HttpTransport;
use crate::types::{ChatRequest, ErrorKind, StreamEvent};
use crate::EventStream;
use futures::stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// Completion orchestrator: one [`ChatService::generate`] call per inbound chat request.
///
/// Cheap to clone; all shared parts are read-only after construction.
#[derive(Clone)]
pub struct ChatService {
    pub(crate) config: Arc<ServiceConfig>,
    pub(crate) transport: HttpTransport,
    pub(crate) retrieval: RetrievalClient,
    pub(crate) assembler: Arc<PromptAssembler>,
    pub(crate) catalog: ToolCatalog,
    pub(crate) backend: Option<Arc<dyn ModelBackend>>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("tools", &self.catalog)
            .field("custom_backend", &self.backend.is_some())
            .finish()
    }
}

impl ChatService {
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn retrieval(&self) -> &RetrievalClient {
        &self.retrieval
    }

    /// Stream the answer to `request` under a fresh request id.
    pub fn generate(&self, request: ChatRequest) -> EventStream {
        self.generate_with_id(request, Uuid::new_v4().to_string())
    }

    /// Stream the answer to `request`.
    ///
    /// The exchange runs on its own task and feeds a bounded channel; dropping
    /// the returned stream cancels the in-flight upstream read.
    pub fn generate_with_id(&self, request: ChatRequest, request_id: String) -> EventStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let span = info_span!("chat", request_id = %request_id, provider = %self.config.provider);
        let service = self.clone();
        tokio::spawn(async move { service.run(request, request_id, tx).await }.instrument(span));
        receiver_stream(rx)
    }

    async fn run(self, request: ChatRequest, request_id: String, tx: mpsc::Sender<StreamEvent>) {
        let provider = self.config.provider;
        info!(
            prompt = crate::utils::text::head(&request.prompt, 70),
            history = request.history.len(),
            "chat request received"
        );

        let backend: Arc<dyn ModelBackend> = match (&self.backend, &self.config.api_key) {
            (Some(custom), _) => custom.clone(),
            (None, Some(_)) => Arc::new(self.http_backend(&request, &request_id)),
            (None, None) => {
                let message = format!(
                    "{} API key is not configured on the server (set {}).",
                    provider.display_name(),
                    provider.api_key_env()
                );
                error!("{}", message);
                let _ = tx.send(StreamEvent::error(ErrorKind::Configuration, message)).await;
                let _ = tx.send(StreamEvent::EndOfStream).await;
                return;
            }
        };

        let mut context = request.context.clone();
        let catalog = if provider.supports_tool_loop() {
            self.catalog.clone()
        } else {
            if context.rag_code_snippets.is_none() && self.retrieval.is_configured() {
                let top_k = self.config.rag_top_k;
                let snippets = tokio::select! {
                    s = self.retrieval.search(&request.prompt, top_k) => s,
                    _ = tx.closed() => return,
                };
                context = context.with_rag_snippets(snippets);
            }
            ToolCatalog::new()
        };

        let messages = self
            .assembler
            .assemble(&request.prompt, &context, &request.history);
        debug!(messages = messages.len(), "prompt assembled");

        let mut tool_loop = ToolLoop::new(messages, catalog, self.config.max_tool_iterations)
            .force_direct_answer(self.config.force_direct_answer_after_tools);
        let state = tool_loop.drive(backend.as_ref(), &tx).await;

        match state {
            LoopState::Done => info!(
                upstream_calls = tool_loop.upstream_calls(),
                tool_executions = tool_loop.tool_executions(),
                "chat request finished"
            ),
            other => info!(state = ?other, upstream_calls = tool_loop.upstream_calls(), "chat request ended"),
        }
    }

    fn http_backend(&self, request: &ChatRequest, request_id: &str) -> HttpModelBackend {
        let params = SamplingParams {
            model: request
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.config.model.clone()),
            temperature: request.temperature.unwrap_or(self.config.default_temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.default_max_tokens),
            include_usage: self.config.include_usage,
        };
        HttpModelBackend::new(
            self.transport.clone(),
            self.config.api_url.clone(),
            params,
            self.config.request_timeout,
        )
        .with_request_id(request_id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Closing,
    Ended,
}

/// Receiver side of an exchange. Guarantees a terminal `EndOfStream` even if
/// the producer task stops early.
fn receiver_stream(rx: mpsc::Receiver<StreamEvent>) -> EventStream {
    Box::pin(stream::unfold((rx, Phase::Open), |(mut rx, phase)| async move {
        match phase {
            Phase::Ended => None,
            Phase::Closing => Some((StreamEvent::EndOfStream, (rx, Phase::Ended))),
            Phase::Open => match rx.recv().await {
                Some(ev) => {
                    let next = if ev.is_end() { Phase::Ended } else { Phase::Open };
                    Some((ev, (rx, next)))
                }
                None => {
                    error!("exchange task stopped without end of stream");
                    let ev = StreamEvent::error(
                        ErrorKind::Internal,
                        "Chat exchange stopped unexpectedly",
                    );
                    Some((ev, (rx, Phase::Closing)))
                }
            },
        }
    }))
}
