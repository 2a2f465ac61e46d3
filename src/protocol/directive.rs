//! Classify a complete model response into the single action it asks for.

use crate::error::{Result, TagloopError};

use super::payload::{FinalAnswer, TagPayload, ToolInvocation, ToolRequest};
use super::tags::{has_tag, TagMatch, TagName};

/// What a model response asks the loop to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Terminal answer.
    Final(FinalAnswer),
    /// Advisory capability request that needs resolving to a tool.
    RequestTool(ToolRequest),
    /// Concrete tool invocation.
    Invoke(ToolInvocation),
    /// No recognized tag.
    NoTag,
}

/// Inspect `response` in priority order: `final_response`, `tool_assistant`,
/// `function_call`.
///
/// A present final tag wins even when other tags are also present. A tag that
/// is present but does not decode is a protocol violation.
pub fn classify(response: &str) -> Result<Directive> {
    if has_tag(response, TagName::FinalResponse) {
        return match FinalAnswer::extract_from(response) {
            TagMatch::Present(answer) => Ok(Directive::Final(answer)),
            TagMatch::Absent => Err(TagloopError::protocol(
                TagName::FinalResponse,
                "empty payload",
            )),
            TagMatch::Malformed { error, .. } => {
                Err(TagloopError::protocol(TagName::FinalResponse, error))
            }
        };
    }

    match ToolRequest::extract_from(response) {
        TagMatch::Present(request) => return Ok(Directive::RequestTool(request)),
        TagMatch::Malformed { error, .. } => {
            return Err(TagloopError::protocol(TagName::ToolAssistant, error))
        }
        TagMatch::Absent => {}
    }

    match ToolInvocation::extract_from(response) {
        TagMatch::Present(invocation) => Ok(Directive::Invoke(invocation)),
        TagMatch::Malformed { error, .. } => {
            Err(TagloopError::protocol(TagName::FunctionCall, error))
        }
        TagMatch::Absent => Ok(Directive::NoTag),
    }
}
