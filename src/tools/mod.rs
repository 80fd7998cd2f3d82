//! Host-side tools the model may call, and the catalog that dispatches them.
//!
//! Tool failures never abort a conversation: every outcome, including bad
//! arguments and unknown names, is a string handed back to the model as the
//! tool result.

use crate::retrieval::RetrievalClient;
use crate::types::{ToolCallRequest, ToolDefinition};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const RAG_TOOL_NAME: &str = "search_uiautomator2_code_snippets";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Schema attached to provider requests.
    fn definition(&self) -> ToolDefinition;

    /// Run with already-parsed arguments and return the tool result text.
    async fn invoke(&self, arguments: &Value) -> String;
}

/// Ordered set of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Execute one requested call. Arguments are parsed fresh for every call.
    pub async fn execute(&self, call: &ToolCallRequest) -> String {
        let name = call.function.name.as_str();
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return format!("Error: Unknown tool {}", name);
        };

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool = name, error = %e, "tool arguments are not valid JSON");
                    return format!("Error: invalid tool arguments: {}", e);
                }
            }
        };

        info!(tool = name, call_id = %call.id, "executing tool");
        tool.invoke(&arguments).await
    }
}

/// Snippet search over the retrieval service.
#[derive(Debug, Clone)]
pub struct RagSearchTool {
    client: RetrievalClient,
    top_k: usize,
}

impl RagSearchTool {
    pub fn new(client: RetrievalClient, top_k: usize) -> Self {
        Self {
            client,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        RAG_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            RAG_TOOL_NAME,
            "Searches a specialized knowledge base for uiautomator2 code snippets, examples, and API usage.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search string for uiautomator2 code help"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, arguments: &Value) -> String {
        match arguments.get("query").and_then(Value::as_str).map(str::trim) {
            Some(query) if !query.is_empty() => self.client.search(query, self.top_k).await,
            _ => "Error: missing required argument 'query'".to_string(),
        }
    }
}
