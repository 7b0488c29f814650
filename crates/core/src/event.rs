//! Per-claim log events.
//!
//! Emitted by the agent runner as it progresses and fanned out to live
//! observers. Append-only: ordering is emission order within one claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log event. Doubles as the SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One line of a claim's execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub claim_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(claim_id: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(claim_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(claim_id, LogLevel::Info, message)
    }

    pub fn success(claim_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(claim_id, LogLevel::Success, message)
    }

    pub fn warning(claim_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(claim_id, LogLevel::Warning, message)
    }

    pub fn error(claim_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(claim_id, LogLevel::Error, message)
    }

    /// Observer-facing frame: `{timestamp, type, message}`.
    pub fn to_frame(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "type": self.level.as_str(),
            "message": self.message,
        })
    }
}
