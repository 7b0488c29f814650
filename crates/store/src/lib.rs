//! Memory-resident state for RoadClaim.
//!
//! - [`ConversationRegistry`]: finalized transcripts by conversation id
//! - [`ClaimStore`]: claim records, lifecycle transitions, run tokens
//! - [`LogBroadcaster`]: per-claim fan-out of log events to live observers
//!
//! Nothing here performs I/O. Locks are `std::sync` and held only for map
//! operations, never across an await point.

pub mod broadcaster;
pub mod claims;
pub mod registry;

pub use broadcaster::{
    DEFAULT_RETAINED_MARKERS, EndReason, LogBroadcaster, StreamItem, Subscription,
};
pub use claims::{ClaimStore, RunHandle};
pub use registry::{ConversationRegistry, StoreOutcome};

use roadclaim_core::ClaimStatus;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Claim {claim_id} cannot move from {from} to {to}")]
    IllegalTransition {
        claim_id: String,
        from: ClaimStatus,
        to: ClaimStatus,
    },

    #[error("Claim {claim_id} is {status}; decisions need a completed claim")]
    NotCompleted {
        claim_id: String,
        status: ClaimStatus,
    },

    #[error("Claim {0} already has an active run")]
    AlreadyRunning(String),
}
