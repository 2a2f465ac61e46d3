//! OpenAI-compatible client tests against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tagloop::agent_loop::{LoopSettings, LoopState, TagLoop};
use tagloop::error::TagloopError;
use tagloop::provider::{ModelClient, OpenAiCompatibleClient};
use tagloop::tools::{
    EndpointResolver, LocalTool, LocalToolset, ToolDispatcher, ToolSummary,
};
use tagloop::types::{FinishReason, GenerationSettings, Message, Role, StreamEventType};

fn client(server: &MockServer) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new("qwen-max", "test-key", Some(format!("{}/", server.uri())))
}

fn sse(lines: &[serde_json::Value], done: bool) -> ResponseTemplate {
    let mut body = String::new();
    for line in lines {
        body.push_str(&format!("data: {line}\n\n"));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn delta(text: &str) -> serde_json::Value {
    json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
    }))
}

#[tokio::test]
async fn stream_yields_text_then_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "qwen-max", "stream": true})))
        .respond_with(sse(
            &[
                json!({"choices": [{"delta": {"role": "assistant"}, "finish_reason": null}]}),
                delta("Hello, "),
                delta("world."),
                json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
            ],
            true,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let stream = client(&server)
        .stream(&[Message::user("hi")], &GenerationSettings::default())
        .await
        .unwrap();
    let deltas: Vec<_> = stream.map(|d| d.unwrap()).collect().await;

    let text: String = deltas
        .iter()
        .filter(|d| d.event_type == StreamEventType::TextDelta)
        .map(|d| d.text.as_str())
        .collect();
    assert_eq!(text, "Hello, world.");
    let last = deltas.last().unwrap();
    assert_eq!(last.event_type, StreamEventType::Done);
    assert_eq!(last.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn stream_without_end_marker_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse(&[delta("cut off")], false))
        .mount(&server)
        .await;

    let stream = client(&server)
        .stream(&[Message::user("hi")], &GenerationSettings::default())
        .await
        .unwrap();
    let items: Vec<_> = stream.collect().await;
    assert!(matches!(items.first(), Some(Ok(d)) if d.text == "cut off"));
    assert!(matches!(items.last(), Some(Err(TagloopError::Transport(_)))));
}

#[tokio::test]
async fn complete_returns_message_content_and_sends_tool_text_as_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "stream": false,
            "temperature": 0.5,
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "user", "content": "tool output"}
            ]
        })))
        .respond_with(completion("<final_response>{\"content\":\"ok\"}</final_response>"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = GenerationSettings::builder().temperature(0.5).build();
    let text = client(&server)
        .complete(
            &[Message::user("hi"), Message::tool("call_1", "tool output")],
            &settings,
        )
        .await
        .unwrap();
    assert_eq!(text, r#"<final_response>{"content":"ok"}</final_response>"#);
}

#[tokio::test]
async fn http_errors_map_to_error_variants() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"retry_after": 1.5}})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let client = client(&server);
    let settings = GenerationSettings::default();
    let messages = [Message::user("hi")];

    let auth = client.complete(&messages, &settings).await.unwrap_err();
    assert!(matches!(auth, TagloopError::Authentication(ref m) if m == "bad key"));
    assert!(!auth.is_retryable());

    let limited = client.stream(&messages, &settings).await.err().unwrap();
    assert!(matches!(
        limited,
        TagloopError::RateLimited {
            retry_after_ms: Some(1500)
        }
    ));

    let server_error = client.complete(&messages, &settings).await.unwrap_err();
    assert!(matches!(server_error, TagloopError::Api { status: 500, .. }));
}

#[tokio::test]
async fn full_turn_against_mock_server_with_local_tools() {
    let server = MockServer::start().await;
    let replies = [
        r#"<tool_assistant>{"server":"weather","tool":"weather"}</tool_assistant>"#,
        r#"<function_call>{"invoke":"get_weather","params":{"city":"London"}}</function_call>"#,
        r#"<final_response>{"content":"Cloudy, 12 degrees."}</final_response>"#,
    ];
    for reply in replies {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(sse(&[delta(reply)], true))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }

    let weather = LocalTool::new(
        ToolSummary::new("get_weather")
            .with_description("Current weather")
            .with_param("city", "city name"),
        |params| async move {
            let city = params
                .get("city")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(json!({"city": city, "temperature": 12}))
        },
    );
    let endpoint = Arc::new(LocalToolset::new("local").with_tool(weather));
    let dispatcher = ToolDispatcher::new(endpoint.clone(), Duration::from_secs(5));
    let resolver = Arc::new(EndpointResolver::new(endpoint));

    let mut agent = TagLoop::new(Arc::new(client(&server)), dispatcher, resolver)
        .with_settings(LoopSettings::builder().build())
        .with_system_prompt("protocol");

    let answer = agent
        .run_turn("Weather in London?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "Cloudy, 12 degrees.");
    assert_eq!(agent.state(), LoopState::AwaitingUserInput);
    assert!(agent.first_chunk_latency().is_some());

    let roles: Vec<Role> = agent.conversation().messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant
        ]
    );
    let resolved = &agent.conversation().messages()[3].content;
    assert!(resolved.contains(r#""tool":"get_weather""#), "{resolved}");
    let tool_result = &agent.conversation().messages()[5].content;
    assert!(tool_result.contains(r#""city":"London""#), "{tool_result}");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}
