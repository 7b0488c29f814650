//! Live per-claim execution trace over SSE.
//!
//! Frame order: one `status` frame with the claim's current status, then
//! every LogEvent published after subscription (event name = level), then
//! a single `end` frame. Idle streams carry `: keepalive` comments.

use crate::{ApiError, SharedState};
use axum::extract::{Path, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use roadclaim_store::{EndReason, StreamItem};
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

fn frame(kind: &str, message: &str) -> SseEvent {
    let data = serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "type": kind,
        "message": message,
    });
    SseEvent::default().event(kind).data(data.to_string())
}

fn end_frame(reason: EndReason) -> SseEvent {
    frame("end", reason.as_str())
}

fn item_frame(item: StreamItem) -> SseEvent {
    match item {
        StreamItem::Event(event) => SseEvent::default()
            .event(event.level.as_str())
            .data(event.to_frame().to_string()),
        StreamItem::End(reason) => end_frame(reason),
    }
}

/// `GET /claim/stream/{id}`
pub async fn claim_stream_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    // Subscribe before reading the status so nothing falls in between.
    let subscription = state.engine.broadcaster.subscribe(&id);
    let status = state
        .engine
        .claims
        .status(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Claim not found: {id}")))?;
    debug!(claim_id = %id, status = %status, "Log stream opened");

    // Terminal markers of old claims are evicted; end from the stored status.
    if let Some(reason) = EndReason::for_status(status) {
        if !state.engine.claims.is_running(&id) {
            state.engine.broadcaster.settle(&id, reason);
        }
    }

    let stream = tokio_stream::once(frame("status", status.as_str()))
        .chain(subscription.map(item_frame))
        .map(Ok);

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keepalive)
            .text("keepalive"),
    ))
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Collect an SSE body into `(event, data)` pairs.
    async fn read_frames(state: &crate::SharedState, uri: &str) -> (StatusCode, Vec<(String, serde_json::Value)>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app(state).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();

        let mut frames = Vec::new();
        for block in text.split("\n\n") {
            let mut event = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            if let (Some(event), Some(data)) = (event, data) {
                frames.push((event, data));
            }
        }
        (status, frames)
    }

    #[tokio::test]
    async fn unknown_claim_is_404() {
        let state = test_state();
        let (status, _) = get(&state, "/claim/stream/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.engine.broadcaster.subscriber_count("nope"), 0);
    }

    #[tokio::test]
    async fn live_stream_carries_the_whole_run() {
        let state = test_state();
        let (_, body) = post_json(&state, "/webhook/transcript", scenario_a()).await;
        let claim_id = body["claim_id"].as_str().unwrap().to_string();

        let (status, frames) = read_frames(&state, &format!("/claim/stream/{claim_id}")).await;
        assert_eq!(status, StatusCode::OK);

        let (first, data) = &frames[0];
        assert_eq!(first, "status");
        assert_eq!(data["type"], "status");

        let (last, data) = frames.last().unwrap();
        assert_eq!(last, "end");
        assert_eq!(data["message"], "completed");

        assert!(frames.iter().any(|(e, _)| e == "success"));
        for (event, data) in &frames {
            assert_eq!(&data["type"], event.as_str());
            assert!(data["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_status_and_end() {
        let state = test_state();
        let (_, body) = post_json(&state, "/webhook/transcript", scenario_a()).await;
        let claim_id = body["claim_id"].as_str().unwrap().to_string();
        wait_terminal(&state, &claim_id).await;
        while !state.engine.broadcaster.is_finished(&claim_id) {
            tokio::task::yield_now().await;
        }

        let (_, frames) = read_frames(&state, &format!("/claim/stream/{claim_id}")).await;
        let events: Vec<&str> = frames.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(events, vec!["status", "end"]);
        assert_eq!(frames[0].1["message"], "completed");
    }

    #[tokio::test]
    async fn terminal_claim_without_marker_still_ends() {
        use roadclaim_core::{Claim, ClaimStatus};

        let state = test_state();
        let claim = Claim::new("conv_old");
        let claim_id = claim.id.clone();
        state.engine.claims.insert(claim);
        state
            .engine
            .claims
            .transition(&claim_id, ClaimStatus::Failed, |_| {})
            .unwrap();
        assert!(!state.engine.broadcaster.is_finished(&claim_id));

        let (status, frames) = read_frames(&state, &format!("/claim/stream/{claim_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<&str> = frames.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(events, vec!["status", "end"]);
        assert_eq!(frames[1].1["message"], "failed");
    }
}
