//! Tool resolution and dispatch.

pub mod dispatcher;
pub mod local;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod resolver;

pub use dispatcher::{ToolDispatcher, ToolEndpoint, ToolSummary};
pub use local::{LocalTool, LocalToolset};
#[cfg(feature = "mcp")]
pub use mcp::{McpEndpoint, McpTransportConfig};
pub use resolver::{
    EndpointResolver, RegisteredTool, ResolverChain, StaticToolRegistry, ToolResolver,
};
