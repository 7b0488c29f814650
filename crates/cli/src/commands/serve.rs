//! `roadclaim serve`: start the HTTP gateway.

use roadclaim_config::AppConfig;
use tracing::{info, warn};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("RoadClaim Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.provider.model);
    if !config.has_api_key() {
        println!("   Warning:   no API key configured, claims will fail at extraction");
        warn!("No API key configured");
    }
    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        provider = %config.provider.name,
        model = %config.provider.model,
        "Starting gateway"
    );

    roadclaim_gateway::start(config).await?;

    Ok(())
}
