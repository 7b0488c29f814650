//! `roadclaim process`: run one transcript through the pipeline in-process.

use roadclaim_config::AppConfig;
use roadclaim_core::{Claim, ClaimStatus};
use roadclaim_store::StreamItem;
use std::path::Path;
use tracing::{error, info};

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let body: serde_json::Value = serde_json::from_str(&text)?;
    let record = roadclaim_gateway::webhook::parse_payload(body)?;
    println!(
        "Conversation {} ({} transcript entries)",
        record.id,
        record.transcript.len()
    );

    let engine = roadclaim_gateway::build_engine(&config)?;
    let (resolution, mut trace) = engine.submit(record)?;
    info!(
        claim_id = %resolution.claim_id,
        file = %file.display(),
        "Processing transcript file"
    );
    println!("Claim {}", resolution.claim_id);
    println!();

    while let Some(item) = trace.recv().await {
        match item {
            StreamItem::Event(event) => println!(
                "  [{}] {:<7} {}",
                event.timestamp.format("%H:%M:%S"),
                event.level,
                event.message
            ),
            StreamItem::End(reason) => println!("  -- {} --", reason.as_str()),
        }
    }

    let claim = engine
        .claims
        .get(&resolution.claim_id)
        .ok_or("Claim disappeared from the store")?;
    println!();
    println!("{}", serde_json::to_string_pretty(&claim)?);

    outcome(&claim).map_err(Into::into)
}

/// Log the final claim status; a failed claim is an error for the command.
fn outcome(claim: &Claim) -> Result<(), String> {
    if claim.status == ClaimStatus::Failed {
        let kind = claim.failure.as_ref().map(|f| f.kind);
        error!(claim_id = %claim.id, ?kind, "Claim failed");
        return Err(format!("Claim {} failed", claim.id));
    }
    info!(claim_id = %claim.id, status = %claim.status, "Claim processed");
    Ok(())
}
