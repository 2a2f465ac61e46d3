//! Typed payloads carried inside protocol tags.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

use super::tags::{self, TagMatch, TagName};

/// A payload type bound to the tag that carries it.
pub trait TagPayload: Serialize + DeserializeOwned {
    const TAG: TagName;

    /// Decode this payload from a complete response.
    fn extract_from(text: &str) -> TagMatch<Self> {
        tags::decode(text, Self::TAG)
    }

    /// Render this payload in the tag wire format.
    fn to_tagged(&self) -> Result<String> {
        tags::render(Self::TAG, self)
    }
}

/// Capability request from `<tool_assistant>`. Advisory only: it names what
/// the model needs, not a concrete tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Platform or category hint, e.g. "weather". Not used for routing.
    #[serde(rename = "server", default)]
    pub server_hint: String,
    /// What the model wants a tool for, or a tool name.
    #[serde(rename = "tool")]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl TagPayload for ToolRequest {
    const TAG: TagName = TagName::ToolAssistant;
}

/// A resolved tool, sent back in `<tool_response>`.
/// `params` maps parameter name to a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl TagPayload for ToolDescription {
    const TAG: TagName = TagName::ToolResponse;
}

/// Concrete invocation from `<function_call>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub invoke: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn new(invoke: impl Into<String>, params: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            invoke: invoke.into(),
            params,
        }
    }
}

impl TagPayload for ToolInvocation {
    const TAG: TagName = TagName::FunctionCall;
}

/// Outcome of a dispatched call, sent back in `<function_call_response>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl FunctionCallResponse {
    /// Wrap a tool's text output. JSON output is embedded as structured JSON,
    /// anything else as a string.
    pub fn success(text: &str) -> Self {
        let result = serde_json::from_str::<serde_json::Value>(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.to_string()));
        Self {
            result: Some(result),
            error: None,
            kind: None,
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            result: None,
            error: Some(error.to_string()),
            kind: Some(error.kind().to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl TagPayload for FunctionCallResponse {
    const TAG: TagName = TagName::FunctionCallResponse;
}

/// Terminal answer from `<final_response>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,
}

impl TagPayload for FinalAnswer {
    const TAG: TagName = TagName::FinalResponse;
}
