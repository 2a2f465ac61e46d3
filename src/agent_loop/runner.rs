//! The orchestration loop: model response, tag dispatch, repeat.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::error::{Result, TagloopError};
use crate::protocol::{
    classify, Directive, FunctionCallResponse, TagPayload, ToolInvocation, ToolRequest,
    NO_TOOL_AVAILABLE,
};
use crate::provider::ModelClient;
use crate::stream_transform::{ChunkSegmenter, MapTransform, StreamTransform};
use crate::tools::{ToolDispatcher, ToolResolver};
use crate::types::Message;

use super::events::{LoopEventEmitter, LoopEventPayload, LoopEventSink};
use super::types::{LoopSettings, LoopState};

/// Drives one conversation through the tag protocol.
///
/// The loop owns its [`Conversation`]. Each call to [`TagLoop::run_turn`]
/// appends the user input and keeps calling the model until a
/// `final_response` arrives, a limit is hit, or the turn is canceled.
pub struct TagLoop {
    conversation: Conversation,
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    resolver: Arc<dyn ToolResolver>,
    settings: LoopSettings,
    event_sink: Option<LoopEventSink>,
    state: LoopState,
    first_chunk_latency: Option<Duration>,
}

impl TagLoop {
    pub fn new(
        model: Arc<dyn ModelClient>,
        dispatcher: ToolDispatcher,
        resolver: Arc<dyn ToolResolver>,
    ) -> Self {
        Self {
            conversation: Conversation::new(),
            model,
            dispatcher,
            resolver,
            settings: LoopSettings::default(),
            event_sink: None,
            state: LoopState::AwaitingUserInput,
            first_chunk_latency: None,
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Seed the conversation's system prompt. Ignored once messages exist.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation.seed(prompt);
        self
    }

    /// Continue an existing conversation.
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_event_sink(mut self, sink: LoopEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// First-chunk latency of the most recent streamed model call.
    pub fn first_chunk_latency(&self) -> Option<Duration> {
        self.first_chunk_latency
    }

    /// Run one user turn and return the final answer's content.
    pub async fn run_turn(
        &mut self,
        input: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let emitter = LoopEventEmitter::new(Uuid::new_v4(), self.event_sink.clone());
        self.conversation.append(Message::user(input))?;

        let mut cycles = 0usize;
        let result = self.drive(&emitter, cancel, &mut cycles).await;

        match &result {
            Ok(answer) => {
                info!(cycles, "turn completed");
                self.transition(&emitter, LoopState::AwaitingUserInput);
                emitter.emit(LoopEventPayload::TurnCompleted {
                    cycles,
                    answer: answer.clone(),
                });
            }
            Err(error) => {
                warn!(cycles, error = %error, category = ?error.category(), "turn failed");
                self.transition(&emitter, LoopState::AwaitingUserInput);
                emitter.emit(LoopEventPayload::TurnFailed {
                    cycles,
                    error: error.to_string(),
                });
            }
        }
        result
    }

    async fn drive(
        &mut self,
        emitter: &LoopEventEmitter,
        cancel: &CancellationToken,
        cycles: &mut usize,
    ) -> Result<String> {
        let mut reprompts = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(TagloopError::Canceled);
            }
            if *cycles >= self.settings.max_cycles {
                return Err(TagloopError::IterationLimitExceeded {
                    limit: self.settings.max_cycles,
                });
            }
            *cycles += 1;
            let cycle = *cycles;

            self.transition(emitter, LoopState::AwaitingModel);
            let response = self.next_response(cycle, emitter, cancel).await?;
            debug!(cycle, chars = response.chars().count(), "model response received");

            let directive = classify(&response);
            self.conversation.append(Message::assistant(response))?;

            match directive {
                Ok(Directive::Final(answer)) => {
                    self.transition(emitter, LoopState::TerminalFinal);
                    return Ok(answer.content);
                }
                Ok(Directive::RequestTool(request)) => {
                    self.resolve_tool(request, emitter, cancel).await?;
                }
                Ok(Directive::Invoke(invocation)) => {
                    self.invoke_tool(invocation, emitter).await?;
                }
                Ok(Directive::NoTag) => {
                    if reprompts >= self.settings.malformed_retries {
                        warn!(cycle, reprompts, "response still has no recognized tag");
                        return Err(TagloopError::protocol(
                            "none",
                            format!("no recognized tag after {reprompts} re-prompt(s)"),
                        ));
                    }
                    reprompts += 1;
                    warn!(cycle, attempt = reprompts, "no recognized tag, re-prompting");
                    emitter.emit(LoopEventPayload::Reprompt { attempt: reprompts });
                    self.conversation
                        .append(Message::user(self.settings.reprompt.clone()))?;
                }
                Err(error) => {
                    warn!(cycle, error = %error, "protocol violation");
                    return Err(error);
                }
            }
        }
    }

    /// Get one full response, bounded by the model timeout and the turn's
    /// cancellation token. Nothing is appended here.
    async fn next_response(
        &mut self,
        cycle: usize,
        emitter: &LoopEventEmitter,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let messages = self.conversation.snapshot();
        let timeout = self.settings.model_timeout;

        let outcome = {
            let work = self.fetch(cycle, &messages, emitter);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(TagloopError::Canceled),
                result = tokio::time::timeout(timeout, work) => match result {
                    Ok(inner) => inner,
                    Err(_) => Err(TagloopError::Timeout(timeout.as_millis() as u64)),
                },
            }
        };

        let (response, latency) = outcome?;
        if latency.is_some() {
            self.first_chunk_latency = latency;
        }
        Ok(response)
    }

    async fn fetch(
        &self,
        cycle: usize,
        messages: &[Message],
        emitter: &LoopEventEmitter,
    ) -> Result<(String, Option<Duration>)> {
        let generation = &self.settings.generation;
        if !self.settings.streaming {
            let text = self.model.complete(messages, generation).await?;
            return Ok((text, None));
        }

        let deltas = self.model.stream(messages, generation).await?;
        let deltas = MapTransform::cleaner().transform(deltas);
        let segmenter = ChunkSegmenter::new();
        let timings = segmenter.timings();
        let mut chunks = segmenter.segment(deltas);

        let mut response = String::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            response.push_str(&chunk.text);
            emitter.emit(LoopEventPayload::Chunk { cycle, chunk });
        }
        Ok((response, timings.first_chunk_latency()))
    }

    /// Resolve a capability request, bounded by the tool timeout. A timed-out
    /// lookup counts as "no tool available".
    async fn resolve_tool(
        &mut self,
        request: ToolRequest,
        emitter: &LoopEventEmitter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let timeout = self.settings.tool_timeout;
        let description = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TagloopError::Canceled),
            found = tokio::time::timeout(timeout, self.resolver.resolve(&request)) => match found {
                Ok(found) => found,
                Err(_) => {
                    warn!(
                        request = %request.tool_name,
                        timeout_ms = timeout.as_millis() as u64,
                        "tool resolution timed out"
                    );
                    None
                }
            },
        };
        let follow_up = match &description {
            Some(found) => {
                debug!(tool = %found.tool, server = %found.server, "tool resolved");
                found.to_tagged()?
            }
            None => {
                warn!(request = %request.tool_name, "no tool matches request");
                NO_TOOL_AVAILABLE.to_string()
            }
        };
        emitter.emit(LoopEventPayload::ToolResolved {
            request,
            description,
        });
        self.conversation.append(Message::user(follow_up))
    }

    async fn invoke_tool(
        &mut self,
        invocation: ToolInvocation,
        emitter: &LoopEventEmitter,
    ) -> Result<()> {
        self.transition(emitter, LoopState::RequestingTool);
        let call_id = format!("call_{}", Uuid::new_v4().simple());
        emitter.emit(LoopEventPayload::ToolDispatched {
            call_id: call_id.clone(),
            tool_name: invocation.invoke.clone(),
            params: invocation.params.clone(),
        });

        self.transition(emitter, LoopState::AwaitingToolResult);
        let outcome = self
            .dispatcher
            .invoke(
                &invocation.invoke,
                &invocation.params,
                Some(self.settings.tool_timeout),
            )
            .await;

        let payload = match &outcome {
            Ok(text) => {
                debug!(tool = %invocation.invoke, call_id = %call_id, "tool call succeeded");
                FunctionCallResponse::success(text)
            }
            Err(error) => {
                warn!(
                    tool = %invocation.invoke,
                    call_id = %call_id,
                    kind = error.kind(),
                    error = %error,
                    "tool call failed"
                );
                FunctionCallResponse::failure(error)
            }
        };
        emitter.emit(LoopEventPayload::ToolCompleted {
            call_id: call_id.clone(),
            tool_name: invocation.invoke,
            error: outcome.as_ref().err().map(|e| e.kind().to_string()),
        });

        self.conversation
            .append(Message::tool(call_id, payload.to_tagged()?))
    }

    fn transition(&mut self, emitter: &LoopEventEmitter, to: LoopState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        debug!(%from, %to, "loop state");
        emitter.emit(LoopEventPayload::StateChanged { from, to });
    }
}

impl std::fmt::Debug for TagLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagLoop")
            .field("model", &self.model.model_id())
            .field("dispatcher", &self.dispatcher)
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("messages", &self.conversation.len())
            .finish()
    }
}
