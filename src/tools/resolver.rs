//! Map an advisory capability request onto a concrete tool description.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::dispatcher::{ToolEndpoint, ToolSummary};
use crate::protocol::{ToolDescription, ToolRequest};

/// Resolves a `tool_assistant` request. `None` means no tool fits.
#[async_trait]
pub trait ToolResolver: Send + Sync {
    async fn resolve(&self, request: &ToolRequest) -> Option<ToolDescription>;
}

/// One statically registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredTool {
    pub server: String,
    pub tool: String,
    /// Lowercase words that select this tool when found in a request.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl RegisteredTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            server: self.server.clone(),
            tool: self.tool.clone(),
            params: self.params.clone(),
        }
    }

    fn matches(&self, request: &ToolRequest) -> bool {
        if self.tool.eq_ignore_ascii_case(request.tool_name.trim()) {
            return true;
        }
        let haystack = request_text(request);
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
    }
}

/// Keyword registry, usually loaded from the `[[tools]]` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl StaticToolRegistry {
    pub fn new(tools: Vec<RegisteredTool>) -> Self {
        Self { tools }
    }

    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolResolver for StaticToolRegistry {
    async fn resolve(&self, request: &ToolRequest) -> Option<ToolDescription> {
        self.tools
            .iter()
            .find(|t| t.matches(request))
            .map(RegisteredTool::describe)
    }
}

/// Resolver that asks an endpoint for its tool list and picks the best name
/// match.
pub struct EndpointResolver {
    endpoint: Arc<dyn ToolEndpoint>,
}

impl EndpointResolver {
    pub fn new(endpoint: Arc<dyn ToolEndpoint>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ToolResolver for EndpointResolver {
    async fn resolve(&self, request: &ToolRequest) -> Option<ToolDescription> {
        let tools = match self.endpoint.list_tools().await {
            Ok(tools) => tools,
            Err(error) => {
                tracing::warn!(
                    endpoint = self.endpoint.name(),
                    error = %error,
                    "listing tools failed during resolution"
                );
                return None;
            }
        };

        best_match(&tools, request).map(|summary| ToolDescription {
            server: self.endpoint.name().to_string(),
            tool: summary.name.clone(),
            params: summary.params.clone(),
        })
    }
}

/// Tries each resolver in order and returns the first hit.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ToolResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

#[async_trait]
impl ToolResolver for ResolverChain {
    async fn resolve(&self, request: &ToolRequest) -> Option<ToolDescription> {
        for resolver in &self.resolvers {
            if let Some(found) = resolver.resolve(request).await {
                return Some(found);
            }
        }
        None
    }
}

fn request_text(request: &ToolRequest) -> String {
    format!("{} {}", request.server_hint, request.tool_name).to_lowercase()
}

/// Exact name first, then the tool whose name parts appear most often in the
/// request text.
fn best_match<'a>(tools: &'a [ToolSummary], request: &ToolRequest) -> Option<&'a ToolSummary> {
    let wanted = request.tool_name.trim();
    if let Some(exact) = tools.iter().find(|t| t.name.eq_ignore_ascii_case(wanted)) {
        return Some(exact);
    }

    let haystack = request_text(request);
    tools
        .iter()
        .map(|tool| {
            let score = tool
                .name
                .to_lowercase()
                .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
                .filter(|part| part.len() > 3 && haystack.contains(part))
                .count();
            (score, tool)
        })
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, tool)| tool)
}
