//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::TagloopError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No request timeout is set here; model turns are bounded by the loop.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// One parsed SSE `data:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseData<'a> {
    Payload(&'a str),
    /// The `[DONE]` terminator.
    Done,
}

/// Parse an SSE line. Returns `None` for anything that is not a `data:` field.
pub fn parse_sse_data(line: &str) -> Option<SseData<'_>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Payload(data))
}

/// Split a response body into trimmed text lines.
///
/// Raw bytes are buffered until a newline arrives, so a multi-byte character
/// split across two reads is decoded whole. A trailing line without a newline
/// is yielded when the body ends.
pub fn sse_lines<S, B>(body: S) -> impl Stream<Item = Result<String, TagloopError>>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut body = std::pin::pin!(body);

        while let Some(read) = body.next().await {
            match read {
                Ok(bytes) => buffer.extend_from_slice(bytes.as_ref()),
                Err(e) => {
                    yield Err(TagloopError::Network(e));
                    return;
                }
            }
            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                match decode_line(&line) {
                    Ok(text) => yield Ok(text),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            yield decode_line(&buffer);
        }
    }
}

fn decode_line(line: &[u8]) -> Result<String, TagloopError> {
    std::str::from_utf8(line)
        .map(|text| text.trim().to_string())
        .map_err(|e| TagloopError::Transport(format!("invalid UTF-8 in event stream: {e}")))
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> TagloopError {
    match status {
        401 | 403 => TagloopError::Authentication(body.to_string()),
        429 => TagloopError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => TagloopError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
