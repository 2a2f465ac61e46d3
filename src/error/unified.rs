//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
///
/// `Protocol` and `IterationLimit` are model misbehavior; the rest are
/// infrastructure or caller problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Transport,
    Timeout,
    Canceled,
    Server,
    Api,
    Configuration,
    Serialization,
    Protocol,
    IterationLimit,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    ReviseSystemPrompt,
    None,
}
