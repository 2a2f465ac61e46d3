//! Configuration system (layered: code > env > TOML file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::agent_loop::LoopSettings;
use crate::error::{Result, TagloopError};
use crate::protocol::ProtocolPrompt;
use crate::provider::openai_compatible::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::provider::OpenAiCompatibleClient;
use crate::tools::{RegisteredTool, StaticToolRegistry};

/// File name looked up in the working directory and the platform config dir.
pub const CONFIG_FILE_NAME: &str = "tagloop.toml";

/// Model connection settings (`[model]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub name: Option<String>,
}

/// MCP tool server (`[mcp]`). Either `url` or `command` may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McpSection {
    pub url: Option<String>,
    pub command: Option<String>,
    pub args: Vec<String>,
}

/// Loop limits (`[loop]`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopSection {
    pub max_cycles: Option<usize>,
    pub malformed_retries: Option<usize>,
    pub model_timeout_secs: Option<u64>,
    pub tool_timeout_secs: Option<u64>,
    pub streaming: Option<bool>,
    pub system_prompt: Option<String>,
}

/// Layered configuration for tagloop.
///
/// Every field is optional so layers can be merged; accessors apply defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagloopConfig {
    pub model: ModelSection,
    pub mcp: McpSection,
    #[serde(rename = "loop")]
    pub turn: LoopSection,
    /// Static tool registry (`[[tools]]`).
    pub tools: Vec<RegisteredTool>,
}

impl TagloopConfig {
    /// Load defaults, then `path` (or a discovered `tagloop.toml`), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover_file(),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "loading config file");
            config.merge(Self::from_file(&file)?);
        }
        config.merge(Self::from_env()?);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build the environment layer from an arbitrary lookup.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        // Set-but-empty variables count as unset.
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        config.model.api_key = ["TAGLOOP_API_KEY", "DASHSCOPE_API_KEY", "OPENAI_API_KEY"]
            .into_iter()
            .find_map(|key| lookup(key));
        config.model.base_url = lookup("TAGLOOP_BASE_URL");
        config.model.name = lookup("TAGLOOP_MODEL");
        config.mcp.url = lookup("TAGLOOP_MCP_URL");
        config.turn.max_cycles = parse_env(&lookup, "TAGLOOP_MAX_CYCLES")?;
        config.turn.tool_timeout_secs = parse_env(&lookup, "TAGLOOP_TOOL_TIMEOUT_SECS")?;

        Ok(config)
    }

    /// First existing `tagloop.toml` in the working directory or the platform
    /// config directory.
    pub fn discover_file() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        ProjectDirs::from("", "", "tagloop")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
    }

    /// Overlay `other` onto `self`; values set in `other` win.
    pub fn merge(&mut self, other: TagloopConfig) {
        fn over<T>(base: &mut Option<T>, top: Option<T>) {
            if top.is_some() {
                *base = top;
            }
        }

        over(&mut self.model.api_key, other.model.api_key);
        over(&mut self.model.base_url, other.model.base_url);
        over(&mut self.model.name, other.model.name);

        // An MCP target from a higher layer replaces the whole section.
        if other.mcp.url.is_some() || other.mcp.command.is_some() {
            self.mcp = other.mcp;
        }

        over(&mut self.turn.max_cycles, other.turn.max_cycles);
        over(&mut self.turn.malformed_retries, other.turn.malformed_retries);
        over(&mut self.turn.model_timeout_secs, other.turn.model_timeout_secs);
        over(&mut self.turn.tool_timeout_secs, other.turn.tool_timeout_secs);
        over(&mut self.turn.streaming, other.turn.streaming);
        over(&mut self.turn.system_prompt, other.turn.system_prompt);

        if !other.tools.is_empty() {
            self.tools = other.tools;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.turn.max_cycles == Some(0) {
            return Err(TagloopError::Configuration(
                "loop.max_cycles must be at least 1".into(),
            ));
        }
        if self.mcp.url.is_some() && self.mcp.command.is_some() {
            return Err(TagloopError::Configuration(
                "mcp.url and mcp.command are mutually exclusive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.model.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.model.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.name = Some(model.into());
        self
    }

    pub fn with_mcp_url(mut self, url: impl Into<String>) -> Self {
        self.mcp = McpSection {
            url: Some(url.into()),
            ..McpSection::default()
        };
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.turn.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.turn.max_cycles = Some(max_cycles);
        self
    }

    pub fn base_url(&self) -> &str {
        self.model.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model_name(&self) -> &str {
        self.model.name.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        let defaults = LoopSettings::default();
        LoopSettings {
            max_cycles: self.turn.max_cycles.unwrap_or(defaults.max_cycles),
            malformed_retries: self
                .turn
                .malformed_retries
                .unwrap_or(defaults.malformed_retries),
            model_timeout: self
                .turn
                .model_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_timeout),
            tool_timeout: self
                .turn
                .tool_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
            streaming: self.turn.streaming.unwrap_or(defaults.streaming),
            ..defaults
        }
    }

    /// The configured system prompt, or the rendered default protocol prompt.
    pub fn system_prompt(&self) -> Result<String> {
        match &self.turn.system_prompt {
            Some(prompt) => Ok(prompt.clone()),
            None => ProtocolPrompt::default().render(),
        }
    }

    pub fn tool_registry(&self) -> StaticToolRegistry {
        StaticToolRegistry::new(self.tools.clone())
    }

    pub fn model_client(&self) -> Result<OpenAiCompatibleClient> {
        let api_key = self.model.api_key.clone().ok_or_else(|| {
            TagloopError::Configuration(
                "no API key: set TAGLOOP_API_KEY, DASHSCOPE_API_KEY or model.api_key".into(),
            )
        })?;
        Ok(OpenAiCompatibleClient::new(
            self.model_name(),
            api_key,
            Some(self.base_url().to_string()),
        ))
    }

    /// The configured MCP endpoint, if any.
    #[cfg(feature = "mcp")]
    pub fn mcp_endpoint(&self) -> Option<crate::tools::McpEndpoint> {
        use crate::tools::McpEndpoint;

        if let Some(url) = &self.mcp.url {
            return Some(McpEndpoint::streamable_http(url.clone()));
        }
        self.mcp
            .command
            .as_ref()
            .map(|command| McpEndpoint::stdio(command.clone(), self.mcp.args.clone()))
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TagloopError::Configuration(format!("{key} is not a valid number: {raw}"))),
    }
}
