//! Finalized call transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a transcript line. Anything that is not the voice agent is the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Agent,
    User,
}

impl Speaker {
    /// Normalise a platform role string (`agent`, `user`, `caller`, ...).
    pub fn from_role(role: &str) -> Self {
        if role.trim().eq_ignore_ascii_case("agent") {
            Self::Agent
        } else {
            Self::User
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::User => "User",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// A transcript as registered by intake. Never mutated once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub transcript: Vec<TranscriptEntry>,
    pub received_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(id: impl Into<String>, transcript: Vec<TranscriptEntry>) -> Self {
        Self {
            id: id.into(),
            transcript,
            received_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// Render as `Agent: ...` / `User: ...` lines for prompts and queries.
    pub fn render(&self) -> String {
        self.transcript
            .iter()
            .map(|e| format!("{}: {}", e.speaker.label(), e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
