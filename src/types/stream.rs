//! Streaming types.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;

/// A delta emitted by a model transport during streaming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStreamDelta {
    /// The incremental text (may be empty).
    pub text: String,
    /// Event type.
    pub event_type: StreamEventType,
    /// Finish reason (only on the final delta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl TextStreamDelta {
    /// A plain text delta.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            event_type: StreamEventType::TextDelta,
            finish_reason: None,
        }
    }

    /// The explicit end-of-stream marker.
    pub fn done(finish_reason: Option<FinishReason>) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::Done,
            finish_reason,
        }
    }
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental text content.
    TextDelta,
    /// Stream finished.
    Done,
}

/// A sentence- or clause-bounded slice of a streamed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamChunk {
    /// Chunk text; ends at a boundary character unless `is_final`.
    pub text: String,
    /// Zero-based emission index within one model turn.
    pub index: usize,
    /// True when this is the trailing flush after the stream ended.
    pub is_final: bool,
}
