//! Conversation and claim queries, plus the approve/reject decision layer.

use crate::{ApiError, SharedState};
use axum::extract::{Path, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use roadclaim_core::{
    ActionRecommendation, Claim, ClaimDecision, ClaimStatus, ConversationRecord,
    CoverageDecision, PolicyholderMessage, TranscriptEntry,
};
use serde::Serialize;
use tracing::info;

// ── Conversations ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub conversation_id: String,
    pub transcription: Vec<TranscriptEntry>,
    pub received_at: DateTime<Utc>,
}

impl From<ConversationRecord> for TranscriptionResponse {
    fn from(record: ConversationRecord) -> Self {
        Self {
            conversation_id: record.id,
            transcription: record.transcript,
            received_at: record.received_at,
        }
    }
}

/// `GET /conversation/latest`
pub async fn latest_conversation_handler(
    State(state): State<SharedState>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    state
        .engine
        .conversations
        .latest()
        .map(|record| Json(record.into()))
        .ok_or_else(|| ApiError::NotFound("No conversation received yet".into()))
}

/// `GET /conversation/{id}/transcription`
pub async fn transcription_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let record = state.engine.conversations.get(&id)?;
    Ok(Json(record.into()))
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub conversation_id: String,
    pub claim_id: String,
}

/// `GET /conversation/{id}/claim`: get or create the claim, starting its run
/// on creation.
pub async fn resolve_claim_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let resolution = state.engine.resolve(&id)?;
    Ok(Json(ResolveResponse {
        conversation_id: id,
        claim_id: resolution.claim_id,
    }))
}

// ── Claims ────────────────────────────────────────────────────────────────

fn find_claim(state: &SharedState, id: &str) -> Result<Claim, ApiError> {
    state
        .engine
        .claims
        .get(id)
        .ok_or_else(|| ApiError::NotFound(format!("Claim not found: {id}")))
}

fn not_ready(stage: &str, claim: &Claim) -> ApiError {
    ApiError::NotFound(format!(
        "{stage} not available yet for claim {} (status: {})",
        claim.id, claim.status
    ))
}

/// `GET /claim/{id}`: the full record, including failure and decision.
pub async fn get_claim_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Claim>, ApiError> {
    find_claim(&state, &id).map(Json)
}

#[derive(Debug, Serialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub conversation_id: String,
    pub status: ClaimStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ClaimDecision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ClaimListResponse {
    pub claims: Vec<ClaimSummary>,
    pub count: usize,
}

/// `GET /claims`, newest first.
pub async fn list_claims_handler(State(state): State<SharedState>) -> Json<ClaimListResponse> {
    let claims: Vec<ClaimSummary> = state
        .engine
        .claims
        .list()
        .into_iter()
        .map(|c| ClaimSummary {
            claim_id: c.id,
            conversation_id: c.conversation_id,
            status: c.status,
            decision: c.decision,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect();
    let count = claims.len();
    Json(ClaimListResponse { claims, count })
}

#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub coverage_decision: CoverageDecision,
}

/// `GET /claim/coverage/{id}`
pub async fn coverage_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CoverageResponse>, ApiError> {
    let claim = find_claim(&state, &id)?;
    let coverage_decision = claim
        .coverage_decision
        .clone()
        .ok_or_else(|| not_ready("Coverage decision", &claim))?;
    Ok(Json(CoverageResponse {
        claim_id: claim.id,
        status: claim.status,
        coverage_decision,
    }))
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub action_recommendation: ActionRecommendation,
}

/// `GET /claim/action/{id}`
pub async fn action_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let claim = find_claim(&state, &id)?;
    let action_recommendation = claim
        .action_recommendation
        .clone()
        .ok_or_else(|| not_ready("Action recommendation", &claim))?;
    Ok(Json(ActionResponse {
        claim_id: claim.id,
        status: claim.status,
        action_recommendation,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub claim_id: String,
    pub status: ClaimStatus,
    pub policyholder_message: PolicyholderMessage,
}

/// `GET /claim/message/{id}`
pub async fn message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claim = find_claim(&state, &id)?;
    let policyholder_message = claim
        .policyholder_message
        .clone()
        .ok_or_else(|| not_ready("Policyholder message", &claim))?;
    Ok(Json(MessageResponse {
        claim_id: claim.id,
        status: claim.status,
        policyholder_message,
    }))
}

// ── Decisions ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub status: &'static str,
    pub claim_id: String,
}

fn decide(
    state: &SharedState,
    id: &str,
    decision: ClaimDecision,
) -> Result<Json<DecisionResponse>, ApiError> {
    let claim = state.engine.claims.decide(id, decision)?;
    info!(claim_id = %claim.id, decision = decision.as_str(), "Claim decision recorded");
    Ok(Json(DecisionResponse {
        status: decision.as_str(),
        claim_id: claim.id,
    }))
}

/// `POST /claim/{id}/approve`
pub async fn approve_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DecisionResponse>, ApiError> {
    decide(&state, &id, ClaimDecision::Approved)
}

/// `POST /claim/{id}/reject`
pub async fn reject_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DecisionResponse>, ApiError> {
    decide(&state, &id, ClaimDecision::Rejected)
}
