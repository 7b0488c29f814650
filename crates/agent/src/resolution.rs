//! Conversation → claim resolution.
//!
//! The only place a run is started. Check-and-create happens under one
//! lock; the run itself is spawned after the lock is released.

use crate::runner::AgentRunner;
use async_trait::async_trait;
use roadclaim_core::Claim;
use roadclaim_store::{ClaimStore, ConversationRegistry, RunHandle, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Drives one claim to a terminal status.
#[async_trait]
pub trait ClaimProcessor: Send + Sync {
    async fn process(&self, handle: RunHandle);
}

#[async_trait]
impl ClaimProcessor for AgentRunner {
    async fn process(&self, handle: RunHandle) {
        self.run(handle).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No transcript registered for conversation '{0}'")]
    TranscriptNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a resolve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub claim_id: String,
    /// `true` only for the caller whose call scheduled the run
    pub created: bool,
}

pub struct ResolutionService {
    index: Mutex<HashMap<String, String>>,
    conversations: Arc<ConversationRegistry>,
    claims: Arc<ClaimStore>,
    processor: Arc<dyn ClaimProcessor>,
}

impl ResolutionService {
    pub fn new(
        conversations: Arc<ConversationRegistry>,
        claims: Arc<ClaimStore>,
        processor: Arc<dyn ClaimProcessor>,
    ) -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            conversations,
            claims,
            processor,
        }
    }

    /// Return the claim for `conversation_id`, creating it and scheduling
    /// its run if none exists yet.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resolve(&self, conversation_id: &str) -> Result<Resolution, ResolveError> {
        self.resolve_with(conversation_id, |_| false, |_| {})
    }

    /// Like [`resolve`](Self::resolve); `on_create` sees the new claim id
    /// before the run is scheduled, so observers can attach without missing
    /// any event.
    pub fn resolve_observed(
        &self,
        conversation_id: &str,
        on_create: impl FnOnce(&str),
    ) -> Result<Resolution, ResolveError> {
        self.resolve_with(conversation_id, |_| false, on_create)
    }

    /// Like [`resolve`](Self::resolve), but replaces a claim that has
    /// already reached a terminal status. A claim still in progress is
    /// returned as is.
    pub fn reprocess(&self, conversation_id: &str) -> Result<Resolution, ResolveError> {
        self.resolve_with(conversation_id, Claim::is_terminal, |_| {})
    }

    /// Claim id for a conversation, without creating one.
    pub fn lookup(&self, conversation_id: &str) -> Option<String> {
        let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.get(conversation_id).cloned()
    }

    fn resolve_with(
        &self,
        conversation_id: &str,
        replace: impl Fn(&Claim) -> bool,
        on_create: impl FnOnce(&str),
    ) -> Result<Resolution, ResolveError> {
        let handle = {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());

            if let Some(existing) = index.get(conversation_id) {
                let keep = self
                    .claims
                    .get(existing)
                    .is_none_or(|claim| !replace(&claim));
                if keep {
                    debug!(conversation_id, claim_id = %existing, "Conversation already resolved");
                    return Ok(Resolution {
                        claim_id: existing.clone(),
                        created: false,
                    });
                }
            }

            let has_transcript = self
                .conversations
                .get(conversation_id)
                .is_ok_and(|record| !record.is_empty());
            if !has_transcript {
                return Err(ResolveError::TranscriptNotFound(conversation_id.to_string()));
            }

            let claim = Claim::new(conversation_id);
            let claim_id = claim.id.clone();
            self.claims.insert(claim);
            let handle = self.claims.begin_run(&claim_id)?;
            index.insert(conversation_id.to_string(), claim_id);
            handle
        };

        let claim_id = handle.claim_id().to_string();
        info!(conversation_id, claim_id = %claim_id, "Claim created, scheduling run");
        on_create(&claim_id);

        let processor = Arc::clone(&self.processor);
        tokio::spawn(async move {
            processor.process(handle).await;
        });

        Ok(Resolution {
            claim_id,
            created: true,
        })
    }
}
