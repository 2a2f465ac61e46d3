//! Model client trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai_compatible;

use async_trait::async_trait;

use crate::error::TagloopError;
use crate::stream_transform::DeltaStream;
use crate::types::{GenerationSettings, Message};

pub use openai_compatible::OpenAiCompatibleClient;

/// A language model reachable over some transport.
///
/// Transport and auth failures are errors; an empty completion is `Ok("")`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn model_id(&self) -> &str;

    /// One full, non-streamed response.
    async fn complete(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<String, TagloopError>;

    /// Incremental deltas, ending with a `Done` delta.
    async fn stream(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<DeltaStream, TagloopError>;
}
