//! HTTP gateway for RoadClaim.
//!
//! Exposes transcript intake (webhook), conversation and claim queries,
//! approve/reject decisions, and a live SSE trace per claim.
//!
//! Built on Axum. Every handler is a thin adapter over [`ClaimEngine`].

pub mod claims;
pub mod error;
pub mod stream;
pub mod webhook;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use roadclaim_agent::ClaimEngine;
use roadclaim_config::{AppConfig, GatewayConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

pub use error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: ClaimEngine,
    /// Idle interval between SSE keepalive comments
    pub keepalive: Duration,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with all routes and layers.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/webhook/transcript",
            get(webhook::liveness_handler).post(webhook::ingest_handler),
        )
        .route("/conversation/latest", get(claims::latest_conversation_handler))
        .route(
            "/conversation/{id}/transcription",
            get(claims::transcription_handler),
        )
        .route("/conversation/{id}/claim", get(claims::resolve_claim_handler))
        .route("/claims", get(claims::list_claims_handler))
        .route("/claim/coverage/{id}", get(claims::coverage_handler))
        .route("/claim/action/{id}", get(claims::action_handler))
        .route("/claim/message/{id}", get(claims::message_handler))
        .route("/claim/stream/{id}", get(stream::claim_stream_handler))
        .route("/claim/{id}", get(claims::get_claim_handler))
        .route("/claim/{id}/approve", post(claims::approve_handler))
        .route("/claim/{id}/reject", post(claims::reject_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Any origin when none are configured; otherwise exactly the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Build the provider, catalog tools and engine described by `config`.
pub fn build_engine(config: &AppConfig) -> Result<ClaimEngine, roadclaim_tools::CatalogError> {
    let provider = roadclaim_providers::build_from_config(config);
    let catalog = roadclaim_tools::Catalog::load(config.catalog.path.as_deref())?;
    info!(
        policies = catalog.policies.len(),
        garages = catalog.garages.len(),
        "Catalog loaded"
    );
    let tools = roadclaim_tools::default_gateway(Arc::new(catalog));
    Ok(ClaimEngine::new(config, provider, tools))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState {
        engine: build_engine(&config)?,
        keepalive: config.streaming.keepalive(),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
