//! tagloop CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tagloop::agent_loop::{LoopEvent, LoopEventPayload, TagLoop};
use tagloop::cli::{ChatArgs, Cli, Commands};
use tagloop::config::TagloopConfig;
use tagloop::protocol::ProtocolPrompt;
use tagloop::tools::{
    EndpointResolver, LocalToolset, ResolverChain, ToolDispatcher, ToolEndpoint,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(args).await,
        Commands::Prompt => ProtocolPrompt::default()
            .render()
            .map(|prompt| println!("{prompt}"))
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TagloopConfig::load(args.config.as_deref())?;
    if let Some(system) = args.system {
        config = config.with_system_prompt(system);
    }
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(url) = args.mcp_url {
        config = config.with_mcp_url(url);
    }
    config.validate()?;

    let settings = config.loop_settings();
    let endpoint: Arc<dyn ToolEndpoint> = match config.mcp_endpoint() {
        Some(mcp) => Arc::new(mcp),
        None => {
            tracing::warn!("no MCP server configured; tool calls will report not_found");
            Arc::new(LocalToolset::new("local"))
        }
    };
    let resolver = ResolverChain::new()
        .with(Arc::new(config.tool_registry()))
        .with(Arc::new(EndpointResolver::new(endpoint.clone())));

    // Stream chunks to stdout, tool activity to stderr
    let sink = Arc::new(|event: LoopEvent| match &event.payload {
        LoopEventPayload::Chunk { chunk, .. } => {
            print!("{}", chunk.text);
            let _ = std::io::stdout().flush();
        }
        LoopEventPayload::ToolResolved { description, .. } => match description {
            Some(found) => eprintln!("\n🔎 {} ({})", found.tool, found.server),
            None => eprintln!("\n🔎 no tool available"),
        },
        LoopEventPayload::ToolDispatched { tool_name, call_id, .. } => {
            eprintln!("\n⚡ {tool_name} ({call_id})");
        }
        LoopEventPayload::ToolCompleted { error: Some(kind), .. } => eprintln!("  ❌ {kind}"),
        LoopEventPayload::ToolCompleted { error: None, .. } => eprintln!("  ✅ done"),
        _ => {}
    });

    let mut tag_loop = TagLoop::new(
        Arc::new(config.model_client()?),
        ToolDispatcher::new(endpoint, settings.tool_timeout),
        Arc::new(resolver),
    )
    .with_settings(settings)
    .with_system_prompt(config.system_prompt()?)
    .with_event_sink(sink);

    if let Some(prompt) = args.prompt {
        let answer = run_one(&mut tag_loop, prompt).await?;
        println!("\n{answer}");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        match run_one(&mut tag_loop, line.to_string()).await {
            Ok(answer) => println!("\n{answer}"),
            Err(e) => eprintln!("\nError: {e}"),
        }
    }
    Ok(())
}

/// Run one turn, canceling it on Ctrl-C.
async fn run_one(tag_loop: &mut TagLoop, input: String) -> tagloop::error::Result<String> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });
    let result = tag_loop.run_turn(input, &cancel).await;
    watcher.abort();
    result
}
