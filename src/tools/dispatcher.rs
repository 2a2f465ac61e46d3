//! Dispatch a named tool call to an endpoint under a bounded timeout.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ToolError;

/// A tool advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSummary {
    pub name: String,
    pub description: Option<String>,
    /// Parameter name to a human-readable description.
    pub params: BTreeMap<String, String>,
}

impl ToolSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.params.insert(name.into(), description.into());
        self
    }

    /// Build a summary from a JSON Schema `properties` object, using each
    /// property's `description` (or its `type`) as the parameter text.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: Option<String>,
        schema: &Map<String, Value>,
    ) -> Self {
        let params = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(key, prop)| {
                        let text = prop
                            .get("description")
                            .or_else(|| prop.get("title"))
                            .or_else(|| prop.get("type"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        (key.clone(), text)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: name.into(),
            description,
            params,
        }
    }
}

/// Something that can execute tools by name.
#[async_trait]
pub trait ToolEndpoint: Send + Sync {
    /// Human-readable endpoint name, used as the `server` of resolved tools.
    fn name(&self) -> &str;

    /// Execute one call and return its text payload.
    async fn call(&self, tool_name: &str, params: &Map<String, Value>)
        -> Result<String, ToolError>;

    /// Tools this endpoint exposes.
    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ToolError>;
}

/// Routes tool invocations to an endpoint.
///
/// Connection setup and the call share one timeout. A timed-out call is
/// abandoned, never retried.
#[derive(Clone)]
pub struct ToolDispatcher {
    endpoint: Arc<dyn ToolEndpoint>,
    default_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(endpoint: Arc<dyn ToolEndpoint>, default_timeout: Duration) -> Self {
        Self {
            endpoint,
            default_timeout,
        }
    }

    pub fn endpoint(&self) -> &Arc<dyn ToolEndpoint> {
        &self.endpoint
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        params: &Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<String, ToolError> {
        let tool_name = tool_name.trim();
        if tool_name.is_empty() {
            return Err(ToolError::InvalidArgument("tool name is empty".into()));
        }

        let timeout = timeout.unwrap_or(self.default_timeout);
        tracing::debug!(
            tool = tool_name,
            endpoint = self.endpoint.name(),
            timeout_ms = timeout.as_millis() as u64,
            "dispatching tool call"
        );

        match tokio::time::timeout(timeout, self.endpoint.call(tool_name, params)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("endpoint", &self.endpoint.name())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
