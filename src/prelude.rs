//! Convenience re-exports for common use.

pub use crate::agent_loop::{LoopEvent, LoopEventPayload, LoopEventSink, LoopSettings, LoopState, TagLoop};
pub use crate::config::TagloopConfig;
pub use crate::conversation::Conversation;
pub use crate::error::{Result, TagloopError, ToolError};
pub use crate::protocol::{
    classify, Directive, FinalAnswer, FunctionCallResponse, ProtocolPrompt, TagMatch, TagName,
    TagPayload, ToolDescription, ToolInvocation, ToolRequest,
};
pub use crate::provider::{ModelClient, OpenAiCompatibleClient};
pub use crate::stream_transform::{ChunkSegmenter, DeltaStream, MapTransform, StreamTransform};
pub use crate::tools::{
    EndpointResolver, LocalTool, LocalToolset, StaticToolRegistry, ToolDispatcher, ToolEndpoint,
    ToolResolver, ToolSummary,
};
pub use crate::types::{
    FinishReason, GenerationSettings, Message, Role, StreamChunk, StreamEventType, TextStreamDelta,
};
pub use tokio_util::sync::CancellationToken;
