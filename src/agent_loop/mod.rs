//! Orchestration loop primitives (state, settings, events, runner).

pub mod events;
pub mod runner;
pub mod types;

pub use events::{LoopEvent, LoopEventPayload, LoopEventSink};
pub use runner::TagLoop;
pub use types::*;
