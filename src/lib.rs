//! tagloop: streaming tag-protocol engine for language models.
//!
//! Two pieces do the work. [`stream_transform::ChunkSegmenter`] re-cuts a
//! model's token stream into clause-sized chunks for speech or UI. The
//! [`agent_loop::TagLoop`] drives a "request a tool, get a result, continue"
//! conversation using XML-like tags inside the model's plain text as the only
//! signaling channel.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagloop::prelude::*;
//!
//! # async fn example() -> tagloop::error::Result<()> {
//! let config = TagloopConfig::load(None)?;
//! let endpoint: Arc<dyn ToolEndpoint> = Arc::new(LocalToolset::new("local"));
//! let dispatcher = ToolDispatcher::new(endpoint.clone(), config.loop_settings().tool_timeout);
//!
//! let mut tag_loop = TagLoop::new(
//!     Arc::new(config.model_client()?),
//!     dispatcher,
//!     Arc::new(EndpointResolver::new(endpoint)),
//! )
//! .with_settings(config.loop_settings())
//! .with_system_prompt(config.system_prompt()?);
//!
//! let answer = tag_loop
//!     .run_turn("What's the weather in London?", &CancellationToken::new())
//!     .await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod protocol;
pub mod provider;
pub mod stream_transform;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
