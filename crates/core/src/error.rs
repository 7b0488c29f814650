//! Error types for the RoadClaim domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] ties them together
//! and [`ErrorKind`] is the stable classification recorded on failed claims.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all RoadClaim operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Intake ---
    #[error("No transcript registered for conversation '{0}'")]
    TranscriptNotFound(String),

    // --- Reasoning model ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Model output could not be parsed during {stage}: {reason}")]
    ModelOutputParse { stage: String, reason: String },

    #[error("Agent loop exceeded {max_steps} steps during {stage} without a final answer")]
    StepLimitExceeded { stage: String, max_steps: u32 },

    // --- Tools ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Deadlines ---
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable failure classification, recorded on claims that end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TranscriptNotFound,
    ToolInvocationError,
    ModelOutputParseError,
    ModelUnavailable,
    Timeout,
    StepLimitExceeded,
    Internal,
}

impl Error {
    /// Classify this error for the claim record and the log stream.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TranscriptNotFound(_) => ErrorKind::TranscriptNotFound,
            Self::Provider(ProviderError::Timeout(_)) => ErrorKind::Timeout,
            Self::Provider(_) => ErrorKind::ModelUnavailable,
            Self::ModelOutputParse { .. } | Self::Serialization(_) => {
                ErrorKind::ModelOutputParseError
            }
            Self::StepLimitExceeded { .. } => ErrorKind::StepLimitExceeded,
            Self::Tool(ToolError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Tool(_) => ErrorKind::ToolInvocationError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a local retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

/// How the core should treat a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    NotFound,
    Transport,
    Timeout,
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not registered: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{tool_name} found no match for {query}")]
    NotFound { tool_name: String, query: String },

    #[error("{tool_name} transport failure: {reason}")]
    Transport { tool_name: String, reason: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("{tool_name} failed definitively: {reason}")]
    Fatal { tool_name: String, reason: String },
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::UnknownTool(_) => ToolErrorKind::UnknownTool,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            Self::NotFound { .. } => ToolErrorKind::NotFound,
            Self::Transport { .. } => ToolErrorKind::Transport,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::Fatal { .. } => ToolErrorKind::Fatal,
        }
    }

    /// Transport failures are the only ones worth retrying locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// A definitive failure ends the run instead of degrading the decision.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Timeout { .. })
    }
}
