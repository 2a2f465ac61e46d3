//! Core types for the orchestration loop.

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::types::GenerationSettings;

/// Unique identifier of one user turn.
pub type TurnId = Uuid;

pub const DEFAULT_MAX_CYCLES: usize = 10;
pub const DEFAULT_MALFORMED_RETRIES: usize = 1;
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REPROMPT: &str = "Your reply did not contain a recognized tag. Reply again \
using exactly one of <final_response>, <tool_assistant> or <function_call>, each wrapping a \
JSON object.";

/// Where the loop is within a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    AwaitingUserInput,
    AwaitingModel,
    RequestingTool,
    AwaitingToolResult,
    TerminalFinal,
}

/// Per-loop limits and behavior.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct LoopSettings {
    /// Hard cap on model calls per user turn.
    #[builder(default = DEFAULT_MAX_CYCLES)]
    pub max_cycles: usize,
    /// How many untagged responses are re-prompted before failing.
    #[builder(default = DEFAULT_MALFORMED_RETRIES)]
    pub malformed_retries: usize,
    #[builder(default = DEFAULT_MODEL_TIMEOUT)]
    pub model_timeout: Duration,
    #[builder(default = DEFAULT_TOOL_TIMEOUT)]
    pub tool_timeout: Duration,
    /// Drain the segmented stream instead of a single completion call.
    #[builder(default = true)]
    pub streaming: bool,
    #[builder(default = DEFAULT_REPROMPT.to_string(), into)]
    pub reprompt: String,
    #[builder(default)]
    pub generation: GenerationSettings,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
