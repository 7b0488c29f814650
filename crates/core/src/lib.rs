//! # RoadClaim Core
//!
//! Domain types, traits, and error definitions for the RoadClaim runtime.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that the store, agent, and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`conversation`]: finalized call transcripts as they arrive from intake
//! - [`claim`]: the claim record, its lifecycle status, and stage outputs
//! - [`event`]: per-claim log events streamed to live observers
//! - [`provider`] / [`message`]: the tool-calling reasoning model seam
//! - [`tool`]: external lookup capabilities behind a uniform [`ToolGateway`]

pub mod claim;
pub mod conversation;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use claim::{
    ActionRecommendation, ActionType, AssistanceType, Claim, ClaimDecision, ClaimFailure,
    ClaimStatus, CoverageDecision, ExtractedFields, Location, PolicyholderMessage, SafetyStatus,
    Vehicle,
};
pub use conversation::{ConversationRecord, Speaker, TranscriptEntry};
pub use error::{Error, ErrorKind, ProviderError, Result, ToolError, ToolErrorKind};
pub use event::{LogEvent, LogLevel};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolGateway, ToolResult};
