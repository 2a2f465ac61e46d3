//! CLI definitions for tagloop.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tagloop CLI
#[derive(Parser, Debug)]
#[command(name = "tagloop", version, about = "Chat with a model through the text tag protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the model; interactive when no prompt is given
    Chat(ChatArgs),
    /// Print the default protocol system prompt
    Prompt,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Path to a tagloop.toml config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// System prompt (overrides the default protocol prompt)
    #[arg(short, long)]
    pub system: Option<String>,

    /// Model name (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Streamable HTTP MCP server URL (overrides config)
    #[arg(long)]
    pub mcp_url: Option<String>,

    /// User prompt (positional)
    pub prompt: Option<String>,
}
