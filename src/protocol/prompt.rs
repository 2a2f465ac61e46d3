//! System prompt that teaches a model the tag protocol by example.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagloopError};

use super::payload::{
    FinalAnswer, FunctionCallResponse, TagPayload, ToolDescription, ToolInvocation, ToolRequest,
};

/// Sentinel fed back to the model when no tool matches a capability request.
pub const NO_TOOL_AVAILABLE: &str = "No tool is available for this request.";

const DEFAULT_TEMPLATE: &str = "User: {user}\nAssistant: {assistant}\n";

const DEFAULT_PREFIX: &str = "\
You are a problem solver. If you can answer without a tool, reply with your answer \
wrapped in a <final_response> tag. If your current abilities are not enough, request a \
tool with a <tool_assistant> tag describing the platform and what the tool must do. \
You will receive a <tool_response> describing the tool; call it with a <function_call> \
tag. You will then receive a <function_call_response>. If the result answers the \
question, reply with <final_response>; otherwise keep requesting tools. Every reply must \
contain exactly one of these tags, each wrapping a JSON object. Never emit \
<function_call> for a tool you have not been given. Examples:\n";

/// One user/assistant exchange shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExample {
    pub user: String,
    pub assistant: String,
}

impl PromptExample {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Builder for the protocol system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolPrompt {
    prefix: String,
    template: String,
    examples: Vec<PromptExample>,
}

impl Default for ProtocolPrompt {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            examples: default_examples(),
        }
    }
}

impl ProtocolPrompt {
    /// A prompt with the default instructions and no examples.
    pub fn empty() -> Self {
        Self {
            examples: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Template with `{user}` and `{assistant}` placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_example(mut self, example: PromptExample) -> Self {
        self.examples.push(example);
        self
    }

    pub fn examples(&self) -> &[PromptExample] {
        &self.examples
    }

    /// Render the full system prompt.
    pub fn render(&self) -> Result<String> {
        for placeholder in ["{user}", "{assistant}"] {
            if !self.template.contains(placeholder) {
                return Err(TagloopError::Configuration(format!(
                    "prompt example template is missing {placeholder}"
                )));
            }
        }

        let examples = self
            .examples
            .iter()
            .map(|example| fill_template(&self.template, &example.user, &example.assistant))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("{}{}", self.prefix, examples))
    }
}

/// Substitute both placeholders in one left-to-right pass, so placeholder
/// text inside an example is copied literally.
fn fill_template(template: &str, user: &str, assistant: &str) -> String {
    let mut out = String::with_capacity(template.len() + user.len() + assistant.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{user}") {
            out.push_str(user);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{assistant}") {
            out.push_str(assistant);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn tagged<T: TagPayload>(payload: T) -> String {
    // Payloads here are plain structs of strings; serialization cannot fail.
    payload.to_tagged().unwrap_or_default()
}

fn default_examples() -> Vec<PromptExample> {
    let weather_request = ToolRequest {
        server_hint: "network lookup".into(),
        tool_name: "look up today's weather for a city".into(),
        params: BTreeMap::new(),
    };
    let weather_tool = ToolDescription {
        server: "network lookup".into(),
        tool: "get_weather".into(),
        params: BTreeMap::from([("city".to_string(), "city name".to_string())]),
    };
    let mut call_params = serde_json::Map::new();
    call_params.insert("city".into(), serde_json::Value::String("Beijing".into()));
    let weather_call = ToolInvocation::new("get_weather", call_params);
    let weather_result =
        FunctionCallResponse::success(r#"{"city":"Beijing","temperature":25,"condition":"sunny"}"#);

    vec![
        PromptExample::new("What's the weather in Beijing today?", tagged(weather_request)),
        PromptExample::new(tagged(weather_tool), tagged(weather_call)),
        PromptExample::new(
            tagged(weather_result),
            tagged(FinalAnswer {
                content: "It is sunny in Beijing today, around 25°C.".into(),
            }),
        ),
        PromptExample::new(
            "Hello",
            tagged(FinalAnswer {
                content: "Hello! How can I help you?".into(),
            }),
        ),
        PromptExample::new(
            "What day of the week is it?",
            tagged(ToolRequest {
                server_hint: "system utilities".into(),
                tool_name: "get the current date and weekday".into(),
                params: BTreeMap::new(),
            }),
        ),
        PromptExample::new(
            NO_TOOL_AVAILABLE,
            tagged(FinalAnswer {
                content: "Sorry, I am unable to answer that right now.".into(),
            }),
        ),
    ]
}
