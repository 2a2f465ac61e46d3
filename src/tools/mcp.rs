//! MCP tool endpoint built on `rmcp`.
//!
//! Every call opens a short-lived session: connect, list tools, call, close.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::{StreamableHttpClientTransport, TokioChildProcess},
};
use serde_json::{Map, Value};
use tokio::process::Command;

use super::dispatcher::{ToolEndpoint, ToolSummary};
use crate::error::ToolError;

type McpSession = RunningService<RoleClient, Box<dyn DynService<RoleClient>>>;

/// How to reach an MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpTransportConfig {
    /// Streamable HTTP endpoint, e.g. `http://127.0.0.1:8000/mcp`.
    StreamableHttp { url: String },
    /// Child process speaking MCP over stdio.
    Stdio { command: String, args: Vec<String> },
}

/// A remote MCP server used as a [`ToolEndpoint`].
#[derive(Debug, Clone)]
pub struct McpEndpoint {
    name: String,
    transport: McpTransportConfig,
}

impl McpEndpoint {
    pub fn new(name: impl Into<String>, transport: McpTransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn streamable_http(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(url.clone(), McpTransportConfig::StreamableHttp { url })
    }

    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        let command = command.into();
        Self::new(command.clone(), McpTransportConfig::Stdio { command, args })
    }

    pub fn transport(&self) -> &McpTransportConfig {
        &self.transport
    }

    async fn connect(&self) -> Result<McpSession, ToolError> {
        let client_info = ClientInfo::default();
        let session = match &self.transport {
            McpTransportConfig::StreamableHttp { url } => {
                let transport = StreamableHttpClientTransport::from_uri(url.clone());
                client_info.into_dyn().serve(transport).await
            }
            McpTransportConfig::Stdio { command, args } => {
                let mut cmd = Command::new(command);
                cmd.args(args);
                let transport = TokioChildProcess::new(cmd).map_err(|error| {
                    ToolError::Transport(format!("failed to spawn MCP server '{command}': {error}"))
                })?;
                client_info.into_dyn().serve(transport).await
            }
        };
        session.map_err(map_client_initialize_error)
    }

    async fn list_in_session(
        session: &McpSession,
        context: &str,
    ) -> Result<Vec<rmcp::model::Tool>, ToolError> {
        match session.list_all_tools().await {
            Ok(tools) => Ok(tools),
            Err(ServiceError::UnexpectedResponse) => session
                .list_tools(None)
                .await
                .map(|page| page.tools)
                .map_err(|e| map_service_error(context, e)),
            Err(e) => Err(map_service_error(context, e)),
        }
    }

    async fn call_in_session(
        session: &McpSession,
        tool_name: &str,
        params: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let tools = Self::list_in_session(session, tool_name).await?;
        if !tools.iter().any(|t| t.name == tool_name) {
            return Err(ToolError::NotFound(tool_name.to_string()));
        }

        let result = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: tool_name.to_owned().into(),
                arguments: Some(params.clone()),
                task: None,
            })
            .await
            .map_err(|e| map_service_error(tool_name, e))?;

        map_call_result(tool_name, result)
    }
}

#[async_trait]
impl ToolEndpoint for McpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, tool_name: &str, params: &Map<String, Value>) -> Result<String, ToolError> {
        let session = self.connect().await?;
        let outcome = Self::call_in_session(&session, tool_name, params).await;
        if let Err(error) = session.cancel().await {
            tracing::debug!(error = %error, "MCP session shutdown failed");
        }
        outcome
    }

    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ToolError> {
        let session = self.connect().await?;
        let outcome = Self::list_in_session(&session, "list_tools").await;
        if let Err(error) = session.cancel().await {
            tracing::debug!(error = %error, "MCP session shutdown failed");
        }
        Ok(outcome?.into_iter().map(map_tool_summary).collect())
    }
}

fn map_tool_summary(tool: rmcp::model::Tool) -> ToolSummary {
    ToolSummary::from_input_schema(
        tool.name.to_string(),
        tool.description.map(|d| d.to_string()),
        &tool.input_schema,
    )
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<String, ToolError> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = text_content
            .or_else(|| result.structured_content.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(ToolError::Remote {
            tool_name: name.to_string(),
            message,
        });
    }

    Ok(text_content
        .or_else(|| result.structured_content.map(|v| v.to_string()))
        .unwrap_or_default())
}

fn map_client_initialize_error(error: ClientInitializeError) -> ToolError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            ToolError::Transport(format!("MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            ToolError::Transport(format!("MCP initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => ToolError::Transport(format!(
            "MCP initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => {
            ToolError::Transport("MCP initialize cancelled".into())
        }
        other => ToolError::Transport(format!("MCP initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> ToolError {
    match error {
        ServiceError::McpError(error) => ToolError::Remote {
            tool_name: context.to_string(),
            message: format!("MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => {
            ToolError::Transport(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            ToolError::Transport(format!("{context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => ToolError::Remote {
            tool_name: context.to_string(),
            message: "unexpected MCP response".into(),
        },
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            ToolError::Transport(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => ToolError::Timeout(timeout.as_millis() as u64),
        other => ToolError::Transport(format!("{context}: MCP service error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn call_result(value: Value) -> CallToolResult {
        serde_json::from_value(value).expect("fixture call result should deserialize")
    }

    #[test]
    fn text_parts_are_joined_with_newlines() {
        let result = call_result(json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "text", "text": "line two"}
            ]
        }));
        assert_eq!(map_call_result("t", result).unwrap(), "line one\nline two");
    }

    #[test]
    fn structured_content_is_used_without_text() {
        let result = call_result(json!({
            "content": [],
            "structuredContent": {"city": "London", "temperature": 12}
        }));
        let text = map_call_result("get_weather", result).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"city": "London", "temperature": 12}));
    }

    #[test]
    fn error_result_maps_to_remote() {
        let result = call_result(json!({
            "content": [{"type": "text", "text": "city not found"}],
            "isError": true
        }));
        let err = map_call_result("get_weather", result).unwrap_err();
        assert_eq!(
            err,
            ToolError::Remote {
                tool_name: "get_weather".into(),
                message: "city not found".into()
            }
        );
    }

    #[test]
    fn service_errors_map_to_tool_error_kinds() {
        let timeout = map_service_error(
            "get_weather",
            ServiceError::Timeout {
                timeout: Duration::from_millis(2750),
            },
        );
        assert_eq!(timeout, ToolError::Timeout(2750));

        let closed = map_service_error("get_weather", ServiceError::TransportClosed);
        assert_eq!(closed.kind(), "transport_error");

        let remote = map_service_error(
            "get_weather",
            ServiceError::McpError(rmcp::model::ErrorData::invalid_params("bad city", None)),
        );
        assert!(matches!(
            remote,
            ToolError::Remote { ref message, .. } if message.contains("bad city")
        ));
    }

    #[test]
    fn initialize_errors_are_transport_failures() {
        let err = map_client_initialize_error(ClientInitializeError::JsonRpcError(
            rmcp::model::ErrorData::invalid_request("bad initialize payload", None),
        ));
        assert!(matches!(
            err,
            ToolError::Transport(ref message) if message.contains("bad initialize payload")
        ));
    }

    #[test]
    fn tool_summary_comes_from_input_schema() {
        let schema = json!({
            "type": "object",
            "properties": {"city": {"type": "string", "title": "City"}}
        });
        let tool = rmcp::model::Tool::new(
            "get_weather",
            "lookup weather",
            schema.as_object().cloned().unwrap(),
        );
        let summary = map_tool_summary(tool);
        assert_eq!(summary.name, "get_weather");
        assert_eq!(summary.description.as_deref(), Some("lookup weather"));
        assert_eq!(summary.params.get("city").map(String::as_str), Some("City"));
    }

    #[test]
    fn constructors_name_endpoint_after_target() {
        let http = McpEndpoint::streamable_http("http://127.0.0.1:8000/mcp");
        assert_eq!(http.name(), "http://127.0.0.1:8000/mcp");
        let stdio = McpEndpoint::stdio("python", vec!["server.py".into()]);
        assert!(matches!(stdio.transport(), McpTransportConfig::Stdio { args, .. } if args.len() == 1));
    }
}
