//! Shared test helpers: a scripted model client and a mock tool endpoint.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use tagloop::agent_loop::{LoopEvent, LoopEventSink};
use tagloop::error::{TagloopError, ToolError};
use tagloop::protocol::{ToolDescription, ToolRequest};
use tagloop::provider::ModelClient;
use tagloop::stream_transform::DeltaStream;
use tagloop::tools::{ToolEndpoint, ToolResolver, ToolSummary};
use tagloop::types::*;

/// One scripted model reply.
pub enum Reply {
    /// Streamed in pieces of `chunk_chars` characters, then `Done`.
    Text(String),
    /// Fails before any delta.
    Fail(TagloopError),
    /// Streams `prefix`, then never finishes.
    Stall(String),
}

/// A model client that plays back queued replies in order.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<Vec<Message>>>,
    chunk_chars: usize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
            chunk_chars: 3,
        }
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for reply in replies {
            model.push(Reply::Text(reply.into()));
        }
        model
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Number of model calls so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Messages passed to the `n`th call.
    pub fn request(&self, n: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[n].clone()
    }

    fn next(&self, messages: &[Message]) -> Reply {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Text("(script exhausted)".into()))
    }
}

fn split_chars(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _settings: &GenerationSettings,
    ) -> Result<String, TagloopError> {
        match self.next(messages) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => Err(error),
            Reply::Stall(_) => std::future::pending().await,
        }
    }

    async fn stream(
        &self,
        messages: &[Message],
        _settings: &GenerationSettings,
    ) -> Result<DeltaStream, TagloopError> {
        let chunk_chars = self.chunk_chars;
        match self.next(messages) {
            Reply::Fail(error) => Err(error),
            Reply::Text(text) => {
                let parts = split_chars(&text, chunk_chars);
                Ok(Box::pin(async_stream::stream! {
                    for part in parts {
                        yield Ok::<_, TagloopError>(TextStreamDelta::text(part));
                    }
                    yield Ok(TextStreamDelta::done(Some(FinishReason::Stop)));
                }))
            }
            Reply::Stall(prefix) => Ok(Box::pin(async_stream::stream! {
                yield Ok::<_, TagloopError>(TextStreamDelta::text(prefix));
                std::future::pending::<()>().await;
            })),
        }
    }
}

/// Behaviour of one mock tool.
#[derive(Clone)]
pub enum ToolBehavior {
    Returns(String),
    Fails(ToolError),
    Sleeps(Duration),
}

/// A tool endpoint with scripted tools that records every call.
pub struct MockEndpoint {
    tools: HashMap<String, ToolBehavior>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tool(mut self, name: &str, behavior: ToolBehavior) -> Self {
        self.tools.insert(name.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(&self, tool_name: &str, params: &Map<String, Value>) -> Result<String, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_string(), params.clone()));
        match self.tools.get(tool_name) {
            None => Err(ToolError::NotFound(tool_name.to_string())),
            Some(ToolBehavior::Returns(text)) => Ok(text.clone()),
            Some(ToolBehavior::Fails(error)) => Err(error.clone()),
            Some(ToolBehavior::Sleeps(duration)) => {
                tokio::time::sleep(*duration).await;
                Ok("late".into())
            }
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolSummary>, ToolError> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        Ok(names.into_iter().map(|n| ToolSummary::new(n.clone())).collect())
    }
}

/// A resolver whose lookup never completes, like a hung tool server.
pub struct PendingResolver;

#[async_trait]
impl ToolResolver for PendingResolver {
    async fn resolve(&self, _request: &ToolRequest) -> Option<ToolDescription> {
        std::future::pending().await
    }
}

/// Event sink that collects every event.
pub fn collecting_sink() -> (LoopEventSink, Arc<Mutex<Vec<LoopEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: LoopEventSink = Arc::new(move |event: LoopEvent| captured.lock().unwrap().push(event));
    (sink, events)
}

pub const WEATHER_JSON: &str = r#"{"city":"London","temperature":12,"condition":"cloudy"}"#;

pub fn tool_assistant(server: &str, tool: &str) -> String {
    format!(r#"<tool_assistant>{{"server":"{server}","tool":"{tool}"}}</tool_assistant>"#)
}

pub fn function_call(invoke: &str, params: Value) -> String {
    format!(
        r#"<function_call>{}</function_call>"#,
        serde_json::json!({"invoke": invoke, "params": params})
    )
}

pub fn final_response(content: &str) -> String {
    format!(
        r#"<final_response>{}</final_response>"#,
        serde_json::json!({"content": content})
    )
}
