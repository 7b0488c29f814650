//! Transcript intake.
//!
//! Accepts two payload shapes:
//!
//! - flat: `{conversation_id, transcript: [{speaker|role, text|message}]}`
//! - envelope: `{type: "post_call_transcription", data: {conversation_id,
//!   transcript: [{role, message, original_message}]}}`

use crate::{ApiError, SharedState};
use axum::extract::State;
use axum::response::Json;
use roadclaim_core::{ConversationRecord, Speaker, TranscriptEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

const ENVELOPE_TYPE: &str = "post_call_transcription";

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default, alias = "role")]
    speaker: Option<String>,
    #[serde(default, alias = "message")]
    text: Option<String>,
    /// Untruncated text, preferred when present
    #[serde(default)]
    original_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTranscript {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    transcript: Vec<RawEntry>,
}

/// Normalise either payload shape into a conversation record.
pub fn parse_payload(body: Value) -> Result<ConversationRecord, ApiError> {
    let payload = match body.get("type") {
        Some(kind) if kind.as_str() == Some(ENVELOPE_TYPE) => body
            .get("data")
            .cloned()
            .ok_or_else(|| ApiError::BadRequest("Envelope has no data".into()))?,
        Some(kind) => {
            return Err(ApiError::BadRequest(format!(
                "Unsupported webhook type: {kind}"
            )));
        }
        None => body,
    };

    let raw: RawTranscript = serde_json::from_value(payload)
        .map_err(|e| ApiError::BadRequest(format!("Malformed transcript: {e}")))?;

    let conversation_id = raw
        .conversation_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing conversation_id".into()))?;

    let transcript = raw
        .transcript
        .into_iter()
        .filter_map(|entry| {
            let text = entry
                .original_message
                .filter(|t| !t.trim().is_empty())
                .or(entry.text)?;
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            let speaker = Speaker::from_role(entry.speaker.as_deref().unwrap_or_default());
            Some(TranscriptEntry::new(speaker, text))
        })
        .collect();

    Ok(ConversationRecord::new(conversation_id, transcript))
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub conversation_id: String,
    pub claim_id: Option<String>,
}

/// `POST /webhook/transcript`
pub async fn ingest_handler(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> Result<Json<IngestResponse>, ApiError> {
    let record = parse_payload(body).inspect_err(|e| warn!(error = %e, "Rejected webhook"))?;
    info!(
        conversation_id = %record.id,
        entries = record.transcript.len(),
        "Webhook transcript received"
    );

    let intake = state.engine.ingest(record)?;
    Ok(Json(IngestResponse {
        status: if intake.claim_id.is_some() {
            "processing"
        } else {
            "received"
        },
        conversation_id: intake.conversation_id,
        claim_id: intake.claim_id,
    }))
}

/// `GET /webhook/transcript`
pub async fn liveness_handler() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn flat_payload_normalises_speakers() {
        let record = parse_payload(scenario_a()).unwrap();
        assert_eq!(record.id, "conv_1");
        assert_eq!(record.transcript.len(), 3);
        assert_eq!(record.transcript[0].speaker, Speaker::Agent);
        assert_eq!(record.transcript[1].speaker, Speaker::User);
    }

    #[test]
    fn envelope_prefers_original_message_and_skips_blank_entries() {
        let record = parse_payload(json!({
            "type": "post_call_transcription",
            "data": {
                "conversation_id": "conv_9",
                "transcript": [
                    {"role": "agent", "message": "Hi"},
                    {"role": "user", "message": "My car...", "original_message": "My car will not start"},
                    {"role": "user", "message": "   "},
                ]
            }
        }))
        .unwrap();
        assert_eq!(record.id, "conv_9");
        assert_eq!(record.transcript.len(), 2);
        assert_eq!(record.transcript[1].text, "My car will not start");
    }

    #[test]
    fn other_envelope_types_are_rejected() {
        let err = parse_payload(json!({"type": "call_started", "data": {}})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn missing_conversation_id_is_rejected() {
        let err = parse_payload(json!({"transcript": []})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn liveness_probe() {
        let state = test_state();
        let (status, body) = get(&state, "/webhook/transcript").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn webhook_starts_processing() {
        let state = test_state();
        let (status, body) = post_json(&state, "/webhook/transcript", scenario_a()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["conversation_id"], "conv_1");
        assert!(body["claim_id"].is_string());
    }

    #[tokio::test]
    async fn short_transcript_is_only_received() {
        let state = test_state();
        let (status, body) = post_json(
            &state,
            "/webhook/transcript",
            json!({"conversation_id": "conv_2", "transcript": [{"speaker": "user", "text": "Hello?"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "received");
        assert!(body["claim_id"].is_null());
        assert!(state.engine.conversations.contains("conv_2"));
    }

    #[tokio::test]
    async fn bad_payload_is_400() {
        let state = test_state();
        let (status, body) = post_json(
            &state,
            "/webhook/transcript",
            json!({"type": "call_started"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("call_started"));
    }
}
