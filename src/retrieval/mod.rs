//! # Retrieval Client
//!
//! Queries the snippet-search service (CocoIndex) and renders the hits as one
//! bounded text block ready for prompt insertion.
//!
//! [`RetrievalClient::search`] never fails: an empty result set yields
//! [`NO_SNIPPETS_FOUND`], and any configuration or transport problem yields an
//! `"Error: ..."` string. The rendered block never exceeds [`MAX_CONTEXT_CHARS`].

use crate::transport::{HttpTransport, TransportError};
use crate::utils::text::{char_len, head, truncate_with_marker};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

pub const MAX_CONTEXT_CHARS: usize = 7000;

pub const NO_SNIPPETS_FOUND: &str =
    "No specific code snippets found in the uiautomator2 codebase relevant to this query.";

pub const NOT_CONFIGURED: &str = "Error: RAG service URL not configured for snippet retrieval.";

const ERROR_PREFIX: &str = "Error:";
const SNIPPET_TRUNCATED: &str = "... (truncated)";
const CONTEXT_TRUNCATED: &str = "\n... (overall RAG context truncated)";
const HEADER: &str = "Relevant uiautomator2 Code Snippets Found:\n\n";

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default = "unknown_filename", deserialize_with = "null_as_unknown")]
    pub filename: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub text: String,
}

fn unknown_filename() -> String {
    "N/A".to_string()
}

fn null_as_unknown<'de, D>(d: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(unknown_filename))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RetrievalResult>,
}

/// Whether a retrieval block holds real snippets (not a sentinel or error text).
pub fn has_snippets(block: &str) -> bool {
    let trimmed = block.trim();
    !trimmed.is_empty() && !trimmed.starts_with(ERROR_PREFIX) && !trimmed.contains(NO_SNIPPETS_FOUND)
}

/// Render hits as labeled, fenced snippets.
///
/// Each snippet is capped at `MAX_CONTEXT_CHARS / top_k` chars, and the whole
/// block at `MAX_CONTEXT_CHARS`; both cuts append a marker.
pub fn format_results(results: &[RetrievalResult], top_k: usize) -> String {
    if results.is_empty() {
        return NO_SNIPPETS_FOUND.to_string();
    }

    let per_snippet = MAX_CONTEXT_CHARS / top_k.max(1);
    let mut out = String::from(HEADER);
    for (i, r) in results.iter().enumerate() {
        let text = truncate_with_marker(&r.text, per_snippet, SNIPPET_TRUNCATED);
        out.push_str(&format!(
            "Snippet {} (from {}, score: {:.2}):\n```python\n{}\n```\n\n",
            i + 1,
            r.filename,
            r.score,
            text.trim()
        ));
    }

    truncate_with_marker(&out, MAX_CONTEXT_CHARS, CONTEXT_TRUNCATED)
        .trim()
        .to_string()
}

/// Client for the snippet-search endpoint.
#[derive(Debug, Clone)]
pub struct RetrievalClient {
    search_url: Option<String>,
    transport: HttpTransport,
}

impl RetrievalClient {
    pub fn new(search_url: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            search_url: search_url.filter(|u| !u.trim().is_empty()),
            transport: HttpTransport::bounded(timeout)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.search_url.is_some()
    }

    /// Raw hits for `query`, at most `top_k` requested.
    pub async fn search_results(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, TransportError> {
        let url = self
            .search_url
            .as_deref()
            .ok_or_else(|| TransportError::Other("RAG service URL not configured".to_string()))?;
        info!(url, query = head(query, 80), "RAG: querying snippet search");

        let body = self
            .transport
            .get_json(url, &[("query", query.to_string()), ("limit", top_k.to_string())])
            .await?;
        let parsed: SearchResponse = serde_json::from_value(body)
            .map_err(|e| TransportError::Other(format!("malformed search response: {}", e)))?;
        Ok(parsed.results)
    }

    /// Formatted snippet block for `query`, or a sentinel/error string. Never fails.
    pub async fn search(&self, query: &str, top_k: usize) -> String {
        if !self.is_configured() {
            error!("RAG: COCOINDEX_SEARCH_API_URL is not configured");
            return NOT_CONFIGURED.to_string();
        }

        match self.search_results(query, top_k.max(1)).await {
            Ok(results) => {
                let block = format_results(&results, top_k.max(1));
                info!(
                    hits = results.len(),
                    chars = char_len(&block),
                    "RAG: snippets retrieved"
                );
                block
            }
            Err(e) => {
                warn!(error = %e, "RAG: snippet search failed");
                truncate_with_marker(
                    &format!("{} {}", ERROR_PREFIX, e),
                    MAX_CONTEXT_CHARS,
                    CONTEXT_TRUNCATED,
                )
            }
        }
    }
}
