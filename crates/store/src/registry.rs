//! Conversation registry.

use crate::StoreError;
use roadclaim_config::DuplicatePolicy;
use roadclaim_core::ConversationRecord;
use std::collections::HashMap;
use std::sync::RwLock;

/// What [`ConversationRegistry::store`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First transcript for this conversation.
    Inserted,
    /// Replaced an empty transcript, or any transcript under `reprocess`.
    Replaced,
    /// A transcript was already registered; the new one was dropped.
    Ignored,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, ConversationRecord>,
    latest: Option<String>,
}

/// Finalized transcripts keyed by conversation id.
///
/// Stores are linearised by the write lock; the `latest` pointer is
/// last-writer-wins in that order.
pub struct ConversationRegistry {
    inner: RwLock<Inner>,
    on_duplicate: DuplicatePolicy,
}

impl ConversationRegistry {
    pub fn new(on_duplicate: DuplicatePolicy) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            on_duplicate,
        }
    }

    pub fn store(&self, record: ConversationRecord) -> StoreOutcome {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        let outcome = match inner.records.get(&record.id) {
            None => StoreOutcome::Inserted,
            Some(existing) if existing.is_empty() => StoreOutcome::Replaced,
            Some(_) if self.on_duplicate == DuplicatePolicy::Reprocess => StoreOutcome::Replaced,
            Some(_) => StoreOutcome::Ignored,
        };

        if outcome != StoreOutcome::Ignored {
            inner.latest = Some(record.id.clone());
            inner.records.insert(record.id.clone(), record);
        }
        outcome
    }

    pub fn get(&self, id: &str) -> Result<ConversationRecord, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.records.contains_key(id)
    }

    pub fn latest_id(&self) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.latest.clone()
    }

    /// The most recently stored transcript.
    pub fn latest(&self) -> Option<ConversationRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .latest
            .as_ref()
            .and_then(|id| inner.records.get(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new(DuplicatePolicy::Ignore)
    }
}
