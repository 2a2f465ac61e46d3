//! The text tag protocol: tag extraction, typed payloads, response
//! classification and the system prompt that teaches it.
//!
//! Every payload is a JSON object wrapped in one of five XML-like tags:
//!
//! ```text
//! <function_call>{"invoke": "get_weather", "params": {"city": "London"}}</function_call>
//! ```

pub mod directive;
pub mod payload;
pub mod prompt;
pub mod tags;

pub use directive::{classify, Directive};
pub use payload::{
    FinalAnswer, FunctionCallResponse, TagPayload, ToolDescription, ToolInvocation, ToolRequest,
};
pub use prompt::{PromptExample, ProtocolPrompt, NO_TOOL_AVAILABLE};
pub use tags::{decode, extract, has_tag, render, TagMatch, TagName};
