//! Claim store and run tokens.

use crate::StoreError;
use chrono::Utc;
use roadclaim_core::{Claim, ClaimDecision, ClaimStatus};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// Concurrency-safe table of claims.
///
/// Status changes go through [`transition`](Self::transition), which rejects
/// anything that is not a forward move. Callers that need check-and-create
/// semantics across claims (one claim per conversation) must provide their
/// own critical section; the store only guards individual records.
#[derive(Default)]
pub struct ClaimStore {
    claims: RwLock<HashMap<String, Claim>>,
    running: Arc<Mutex<HashSet<String>>>,
}

impl ClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, claim: Claim) {
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        claims.insert(claim.id.clone(), claim);
    }

    pub fn get(&self, id: &str) -> Option<Claim> {
        let claims = self.claims.read().unwrap_or_else(|e| e.into_inner());
        claims.get(id).cloned()
    }

    pub fn status(&self, id: &str) -> Option<ClaimStatus> {
        let claims = self.claims.read().unwrap_or_else(|e| e.into_inner());
        claims.get(id).map(|c| c.status)
    }

    /// All claims, newest first.
    pub fn list(&self) -> Vec<Claim> {
        let claims = self.claims.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Claim> = claims.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.claims.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutate a claim's result fields without changing its status.
    pub fn update<F>(&self, id: &str, f: F) -> Result<Claim, StoreError>
    where
        F: FnOnce(&mut Claim),
    {
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        let claim = claims
            .get_mut(id)
            .ok_or_else(|| StoreError::ClaimNotFound(id.to_string()))?;
        let status = claim.status;
        f(claim);
        claim.status = status;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }

    /// Move a claim to `next`, applying `f` in the same write.
    pub fn transition<F>(&self, id: &str, next: ClaimStatus, f: F) -> Result<Claim, StoreError>
    where
        F: FnOnce(&mut Claim),
    {
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        let claim = claims
            .get_mut(id)
            .ok_or_else(|| StoreError::ClaimNotFound(id.to_string()))?;

        if !claim.status.can_transition_to(next) {
            return Err(StoreError::IllegalTransition {
                claim_id: id.to_string(),
                from: claim.status,
                to: next,
            });
        }

        f(claim);
        claim.status = next;
        claim.updated_at = Utc::now();
        Ok(claim.clone())
    }

    /// Record an approve/reject decision. Only completed claims accept one.
    pub fn decide(&self, id: &str, decision: ClaimDecision) -> Result<Claim, StoreError> {
        let mut claims = self.claims.write().unwrap_or_else(|e| e.into_inner());
        let claim = claims
            .get_mut(id)
            .ok_or_else(|| StoreError::ClaimNotFound(id.to_string()))?;

        if claim.status != ClaimStatus::Completed {
            return Err(StoreError::NotCompleted {
                claim_id: id.to_string(),
                status: claim.status,
            });
        }

        let now = Utc::now();
        claim.decision = Some(decision);
        claim.decided_at = Some(now);
        claim.updated_at = now;
        Ok(claim.clone())
    }

    /// Take the run token for a claim. At most one exists per claim.
    pub fn begin_run(&self, id: &str) -> Result<RunHandle, StoreError> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(id.to_string()) {
            return Err(StoreError::AlreadyRunning(id.to_string()));
        }
        Ok(RunHandle {
            claim_id: id.to_string(),
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_running(&self, id: &str) -> bool {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.contains(id)
    }
}

/// Exclusive token for an active run on one claim. Released on drop.
#[derive(Debug)]
pub struct RunHandle {
    claim_id: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl RunHandle {
    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.claim_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadclaim_core::CoverageDecision;

    fn store_with_claim() -> (ClaimStore, String) {
        let store = ClaimStore::new();
        let claim = Claim::new("conv_1");
        let id = claim.id.clone();
        store.insert(claim);
        (store, id)
    }

    #[test]
    fn transition_moves_forward_only() {
        let (store, id) = store_with_claim();
        store.transition(&id, ClaimStatus::Extracting, |_| {}).unwrap();
        store.transition(&id, ClaimStatus::CoverageCheck, |_| {}).unwrap();

        let err = store.transition(&id, ClaimStatus::Extracting, |_| {}).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        assert_eq!(store.status(&id), Some(ClaimStatus::CoverageCheck));
    }

    #[test]
    fn transition_applies_fields_atomically() {
        let (store, id) = store_with_claim();
        let snapshot = store
            .transition(&id, ClaimStatus::CoverageCheck, |c| {
                c.coverage_decision = Some(CoverageDecision::unverified("no policy"));
            })
            .unwrap();
        assert_eq!(snapshot.status, ClaimStatus::CoverageCheck);
        assert!(store.get(&id).unwrap().coverage_decision.is_some());
    }

    #[test]
    fn update_cannot_change_status() {
        let (store, id) = store_with_claim();
        let claim = store.update(&id, |c| c.status = ClaimStatus::Completed).unwrap();
        assert_eq!(claim.status, ClaimStatus::Pending);
    }

    #[test]
    fn terminal_claims_are_frozen() {
        let (store, id) = store_with_claim();
        store.transition(&id, ClaimStatus::Failed, |_| {}).unwrap();
        assert!(store.transition(&id, ClaimStatus::Completed, |_| {}).is_err());
        assert!(store.transition(&id, ClaimStatus::Failed, |_| {}).is_err());
    }

    #[test]
    fn decide_requires_completed() {
        let (store, id) = store_with_claim();
        let err = store.decide(&id, ClaimDecision::Approved).unwrap_err();
        assert!(matches!(err, StoreError::NotCompleted { .. }));

        store.transition(&id, ClaimStatus::Completed, |_| {}).unwrap();
        let claim = store.decide(&id, ClaimDecision::Rejected).unwrap();
        assert_eq!(claim.decision, Some(ClaimDecision::Rejected));
        assert!(claim.decided_at.is_some());
        assert_eq!(claim.status, ClaimStatus::Completed);
    }

    #[test]
    fn missing_claim_errors() {
        let store = ClaimStore::new();
        assert_eq!(
            store.decide("nope", ClaimDecision::Approved).unwrap_err(),
            StoreError::ClaimNotFound("nope".into())
        );
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn run_handle_is_exclusive_and_released_on_drop() {
        let (store, id) = store_with_claim();
        let handle = store.begin_run(&id).unwrap();
        assert_eq!(handle.claim_id(), id);
        assert!(store.is_running(&id));
        assert_eq!(
            store.begin_run(&id).unwrap_err(),
            StoreError::AlreadyRunning(id.clone())
        );

        drop(handle);
        assert!(!store.is_running(&id));
        assert!(store.begin_run(&id).is_ok());
    }

    #[test]
    fn list_is_newest_first() {
        let store = ClaimStore::new();
        let mut older = Claim::new("conv_a");
        older.created_at -= chrono::Duration::seconds(30);
        let newer = Claim::new("conv_b");
        store.insert(older);
        store.insert(newer);
        let list = store.list();
        assert_eq!(list[0].conversation_id, "conv_b");
        assert_eq!(list[1].conversation_id, "conv_a");
    }
}
