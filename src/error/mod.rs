//! Error types for tagloop.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all tagloop operations.
///
/// Tool failures are deliberately absent here: they are [`ToolError`]s that the
/// orchestration loop records into the conversation instead of raising.
#[derive(Error, Debug)]
pub enum TagloopError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Turn canceled")]
    Canceled,

    #[error("Protocol violation in <{tag}>: {message}")]
    ProtocolViolation { tag: String, message: String },

    #[error("Tool loop exceeded {limit} model cycles without a final response")]
    IterationLimitExceeded { limit: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TagloopError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a protocol violation for the given tag.
    pub fn protocol(tag: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            tag: tag.to_string(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Transport(_) => ErrorCategory::Transport,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Canceled => ErrorCategory::Canceled,
            Self::Configuration(_) | Self::ConfigFile(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::ProtocolViolation { .. } => ErrorCategory::Protocol,
            Self::IterationLimitExceeded { .. } => ErrorCategory::IterationLimit,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether a caller-layered retry may repeat the failed turn.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Transport
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Transport
            | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Protocol | ErrorCategory::IterationLimit => {
                RecoverySuggestion::ReviseSystemPrompt
            }
            _ => RecoverySuggestion::None,
        }
    }
}

/// Failure of a single tool dispatch.
///
/// These never abort a turn; the loop turns them into a tool-role message so
/// the model can react.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("Tool transport error: {0}")]
    Transport(String),

    #[error("Tool '{tool_name}' failed: {message}")]
    Remote { tool_name: String, message: String },

    #[error("Tool call timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid tool call: {0}")]
    InvalidArgument(String),
}

impl ToolError {
    /// Short machine-readable kind, written into the tool-role message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport_error",
            Self::Remote { .. } => "remote_error",
            Self::Timeout(_) => "timeout",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TagloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_and_iteration_errors_are_not_retryable() {
        let protocol = TagloopError::protocol("function_call", "bad json");
        assert_eq!(protocol.category(), ErrorCategory::Protocol);
        assert!(!protocol.is_retryable());

        let limit = TagloopError::IterationLimitExceeded { limit: 3 };
        assert_eq!(limit.category(), ErrorCategory::IterationLimit);
        assert_eq!(
            limit.recovery_suggestion(),
            RecoverySuggestion::ReviseSystemPrompt
        );
    }

    #[test]
    fn api_status_maps_to_category() {
        assert_eq!(
            TagloopError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(TagloopError::api(503, "down").category(), ErrorCategory::Server);
        assert!(TagloopError::api(503, "down").is_retryable());
        assert_eq!(TagloopError::api(400, "bad").category(), ErrorCategory::Api);
    }

    #[test]
    fn tool_error_kinds_are_stable() {
        assert_eq!(ToolError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ToolError::Timeout(10).kind(), "timeout");
        assert_eq!(
            ToolError::Remote {
                tool_name: "x".into(),
                message: "boom".into()
            }
            .to_string(),
            "Tool 'x' failed: boom"
        );
    }
}
