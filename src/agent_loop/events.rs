//! Loop event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{ToolDescription, ToolRequest};
use crate::types::StreamChunk;

use super::types::{LoopState, TurnId};

/// Callback used for streaming loop events.
pub type LoopEventSink = Arc<dyn Fn(LoopEvent) + Send + Sync>;

/// Concrete event payloads emitted by the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEventPayload {
    StateChanged {
        from: LoopState,
        to: LoopState,
    },
    Chunk {
        cycle: usize,
        chunk: StreamChunk,
    },
    ToolResolved {
        request: ToolRequest,
        /// `None` when no tool matched and the sentinel was sent.
        description: Option<ToolDescription>,
    },
    ToolDispatched {
        call_id: String,
        tool_name: String,
        params: serde_json::Map<String, serde_json::Value>,
    },
    ToolCompleted {
        call_id: String,
        tool_name: String,
        /// Error kind when the call failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Reprompt {
        attempt: usize,
    },
    TurnCompleted {
        cycles: usize,
        answer: String,
    },
    TurnFailed {
        cycles: usize,
        error: String,
    },
}

/// Envelope for loop events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopEvent {
    pub turn_id: TurnId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: LoopEventPayload,
}

pub(crate) struct LoopEventEmitter {
    turn_id: TurnId,
    seq: AtomicU64,
    sink: Option<LoopEventSink>,
}

impl LoopEventEmitter {
    pub(crate) fn new(turn_id: TurnId, sink: Option<LoopEventSink>) -> Self {
        Self {
            turn_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: LoopEventPayload) {
        let Some(sink) = &self.sink else { return };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(LoopEvent {
            turn_id: self.turn_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
