//! Mock HTTP server setup for integration tests

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use uiautodev::{ChatService, ProviderKind, ServiceConfig};

pub const CHAT_PATH: &str = "/chat/completions";
pub const SEARCH_PATH: &str = "/search";
pub const TEST_API_KEY: &str = "test-key";

/// Test fixture that manages a mock provider and retrieval server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_PATH)
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, SEARCH_PATH)
    }

    /// Configuration pointing both upstreams at the mock server
    pub fn config(&self, provider: ProviderKind) -> ServiceConfig {
        ServiceConfig::new(provider)
            .with_api_key(TEST_API_KEY)
            .with_api_url(self.chat_url())
            .with_rag_search_url(Some(self.search_url()))
    }

    pub fn service(&self, provider: ProviderKind) -> ChatService {
        ChatService::builder()
            .config(self.config(provider))
            .build()
            .expect("service builds")
    }

    /// SSE body from data payloads; each gets the `data: ` prefix unless present
    pub fn sse_body(chunks: &[&str]) -> String {
        chunks
            .iter()
            .map(|chunk| {
                if chunk.starts_with("data:") {
                    format!("{}\n\n", chunk)
                } else {
                    format!("data: {}\n\n", chunk)
                }
            })
            .collect()
    }

    /// Create a mock for a successful streaming response (SSE), matching any body
    pub async fn mock_sse_stream(&self, chunks: &[&str]) -> Mock {
        self.mock_sse_stream_matching(Matcher::Any, chunks).await
    }

    /// Create a mock for a streaming response to requests whose body matches `body`
    pub async fn mock_sse_stream_matching(&self, body: Matcher, chunks: &[&str]) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", CHAT_PATH)
            .match_header("authorization", format!("Bearer {}", TEST_API_KEY).as_str())
            .match_body(body)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(Self::sse_body(chunks))
            .create_async()
            .await
    }

    /// Create a mock for an error response from the provider
    pub async fn mock_error_response(&self, status: usize, error_body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", CHAT_PATH)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .create_async()
            .await
    }

    /// Create a mock for the snippet search endpoint
    pub async fn mock_search(&self, query: Matcher, response: &Value) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(query)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response.to_string())
            .create_async()
            .await
    }

    pub async fn mock_search_status(&self, status: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", SEARCH_PATH)
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body("search backend unavailable")
            .create_async()
            .await
    }
}
