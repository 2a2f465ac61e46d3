//! OpenAI-compatible Chat Completions client (DashScope compatible mode,
//! OpenAI, and similar gateways).

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::TagloopError;
use crate::stream_transform::DeltaStream;
use crate::types::*;

use super::http::{
    bearer_headers, parse_sse_data, shared_client, sse_lines, status_to_error, SseData,
};
use super::ModelClient;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-max";

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
        stream: bool,
    ) -> serde_json::Value {
        let messages = messages.iter().map(message_to_openai).collect::<Vec<_>>();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), self.model.clone().into());
        body.insert("messages".into(), messages.into());
        body.insert("stream".into(), stream.into());

        if let Some(max) = settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            body.insert("stop".into(), serde_json::json!(stops));
        }
        if let Some(seed) = settings.seed {
            body.insert("seed".into(), seed.into());
        }

        serde_json::Value::Object(body)
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, TagloopError> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<String, TagloopError> {
        debug!(model = %self.model, messages = messages.len(), "chat completion");
        let body = self.build_request_body(messages, settings, false);
        let data: ChatResponse = self.post(&body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TagloopError::api(200, "No choices in chat completion response"))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<DeltaStream, TagloopError> {
        debug!(model = %self.model, messages = messages.len(), "streaming chat completion");
        let body = self.build_request_body(messages, settings, true);
        let byte_stream = self.post(&body).await?.bytes_stream();

        let lines = sse_lines(byte_stream);

        let stream = async_stream::stream! {
            let mut finish: Option<FinishReason> = None;
            let mut terminated = false;
            let mut lines = std::pin::pin!(lines);

            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                match parse_sse_data(&line) {
                    Some(SseData::Done) => {
                        terminated = true;
                        break;
                    }
                    Some(SseData::Payload(data)) => {
                        let Ok(parsed) = serde_json::from_str::<StreamChunkBody>(data) else {
                            debug!(line = %data, "skipping unparseable stream chunk");
                            continue;
                        };
                        if let Some(choice) = parsed.choices.into_iter().next() {
                            if let Some(reason) =
                                choice.finish_reason.as_deref().and_then(parse_finish_reason)
                            {
                                finish = Some(reason);
                            }
                            let text = choice.delta.content.unwrap_or_default();
                            if !text.is_empty() {
                                yield Ok(TextStreamDelta::text(text));
                            }
                        }
                    }
                    None => {}
                }
            }

            if terminated || finish.is_some() {
                yield Ok(TextStreamDelta::done(finish));
            } else {
                yield Err(TagloopError::Transport(
                    "stream closed before end-of-stream marker".into(),
                ));
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    // No native tool calling: tool results travel as user text.
    let role = match msg.role {
        Role::System => "system",
        Role::User | Role::Tool => "user",
        Role::Assistant => "assistant",
    };
    serde_json::json!({ "role": role, "content": msg.content })
}

// Chat Completions response types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunkBody {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
