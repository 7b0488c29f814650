//! Wiring of registry, claim store, broadcaster, runner and resolution.

use crate::resolution::{Resolution, ResolutionService, ResolveError};
use crate::runner::{AgentRunner, RunnerSettings};
use roadclaim_config::{AppConfig, DuplicatePolicy};
use roadclaim_core::{ConversationRecord, Provider, ToolGateway};
use roadclaim_store::{
    ClaimStore, ConversationRegistry, LogBroadcaster, StoreOutcome, Subscription,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of ingesting one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intake {
    pub conversation_id: String,
    /// `None` when the transcript was stored without triggering a run
    pub claim_id: Option<String>,
}

/// Everything the HTTP surface and the CLI need, built once per process.
#[derive(Clone)]
pub struct ClaimEngine {
    pub conversations: Arc<ConversationRegistry>,
    pub claims: Arc<ClaimStore>,
    pub broadcaster: LogBroadcaster,
    pub resolution: Arc<ResolutionService>,
    min_transcript_entries: usize,
    on_duplicate: DuplicatePolicy,
}

impl ClaimEngine {
    pub fn new(config: &AppConfig, provider: Arc<dyn Provider>, tools: ToolGateway) -> Self {
        let conversations = Arc::new(ConversationRegistry::new(config.intake.on_duplicate));
        let claims = Arc::new(ClaimStore::new());
        let broadcaster = LogBroadcaster::new(config.streaming.subscriber_buffer);

        let runner = AgentRunner::new(
            provider,
            Arc::new(tools),
            Arc::clone(&conversations),
            Arc::clone(&claims),
            broadcaster.clone(),
            RunnerSettings::from_config(config),
        );
        let resolution = Arc::new(ResolutionService::new(
            Arc::clone(&conversations),
            Arc::clone(&claims),
            Arc::new(runner),
        ));

        Self {
            conversations,
            claims,
            broadcaster,
            resolution,
            min_transcript_entries: config.intake.min_transcript_entries,
            on_duplicate: config.intake.on_duplicate,
        }
    }

    /// Store a finalized transcript and, if it is long enough, resolve it
    /// to a claim.
    ///
    /// Under [`DuplicatePolicy::Reprocess`], a replacement arriving while the
    /// conversation's claim is still in progress is dropped, so the stored
    /// transcript is always the one the claim was built from.
    pub fn ingest(&self, record: ConversationRecord) -> Result<Intake, ResolveError> {
        let conversation_id = record.id.clone();
        let entries = record.transcript.len();

        if self.on_duplicate == DuplicatePolicy::Reprocess {
            if let Some(claim_id) = self.claim_in_progress(&conversation_id) {
                warn!(
                    conversation_id = %conversation_id,
                    claim_id = %claim_id,
                    "Claim still in progress, replacement transcript dropped"
                );
                return Ok(Intake {
                    conversation_id,
                    claim_id: Some(claim_id),
                });
            }
        }

        let outcome = self.conversations.store(record);
        info!(conversation_id = %conversation_id, entries, ?outcome, "Transcript received");

        if entries < self.min_transcript_entries {
            info!(
                conversation_id = %conversation_id,
                min = self.min_transcript_entries,
                "Transcript too short, not processing"
            );
            return Ok(Intake {
                conversation_id,
                claim_id: None,
            });
        }

        let resolution = match (outcome, self.on_duplicate) {
            (StoreOutcome::Replaced, DuplicatePolicy::Reprocess) => {
                self.resolution.reprocess(&conversation_id)?
            }
            _ => self.resolution.resolve(&conversation_id)?,
        };

        Ok(Intake {
            conversation_id,
            claim_id: Some(resolution.claim_id),
        })
    }

    pub fn resolve(&self, conversation_id: &str) -> Result<Resolution, ResolveError> {
        self.resolution.resolve(conversation_id)
    }

    fn claim_in_progress(&self, conversation_id: &str) -> Option<String> {
        let claim_id = self.resolution.lookup(conversation_id)?;
        let status = self.claims.status(&claim_id)?;
        (!status.is_terminal()).then_some(claim_id)
    }

    /// Store a transcript, resolve it regardless of length, and subscribe to
    /// the claim's log. A newly created claim is subscribed before its run
    /// is scheduled.
    pub fn submit(
        &self,
        record: ConversationRecord,
    ) -> Result<(Resolution, Subscription), ResolveError> {
        let conversation_id = record.id.clone();
        self.conversations.store(record);

        let mut subscription = None;
        let resolution = self.resolution.resolve_observed(&conversation_id, |claim_id| {
            subscription = Some(self.broadcaster.subscribe(claim_id));
        })?;
        let subscription =
            subscription.unwrap_or_else(|| self.broadcaster.subscribe(&resolution.claim_id));
        Ok((resolution, subscription))
    }
}
