//! In-process tool endpoint backed by closures.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::dispatcher::{ToolEndpoint, ToolSummary};
use crate::error::ToolError;

type LocalHandler = dyn Fn(Map<String, Value>) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool.
pub struct LocalTool {
    summary: ToolSummary,
    handler: Arc<LocalHandler>,
}

impl LocalTool {
    /// Create a tool from an async closure. String results are returned as-is,
    /// other JSON values are serialized.
    pub fn new<F, Fut>(summary: ToolSummary, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            summary,
            handler: Arc::new(move |params| Box::pin(handler(params))),
        }
    }

    pub fn summary(&self) -> &ToolSummary {
        &self.summary
    }
}

impl std::fmt::Debug for LocalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTool")
            .field("name", &self.summary.name)
            .finish()
    }
}

/// A named set of [`LocalTool`]s.
#[derive(Debug)]
pub struct LocalToolset {
    name: String,
    tools: BTreeMap<String, LocalTool>,
}

impl LocalToolset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: BTreeMap::new(),
        }
    }

    pub fn with_tool(mut self, tool: LocalTool) -> Self {
        self.tools.insert(tool.summary.name.clone(), tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolEndpoint for LocalToolset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, tool_name: &str, params: &Map<String, Value>) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        match (tool.handler)(params.clone()).await? {
            Value::String(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ToolError> {
        Ok(self.tools.values().map(|t| t.summary.clone()).collect())
    }
}
