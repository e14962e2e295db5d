//! Operational endpoints: liveness, ingestion status, on-demand backfill
//! and covenant participation.

use crate::{
    api::{error::ApiError, response::ApiResponse},
    blockchain::{client::build_backoff, polling},
    network::NetworkServices,
    state::AppState,
    validation::{validate_backfill_range, validate_network},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

// POST /networks/{network}/backfill query parameters
#[derive(Deserialize)]
pub struct BackfillQuery {
    from: String,
    to: Option<String>,
}

#[derive(Serialize)]
struct BackfillAccepted {
    network: String,
    from: u64,
    to: Option<u64>,
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/networks/{network}/status", get(network_status))
        .route("/networks/{network}/backfill", post(start_backfill))
        .route("/networks/{network}/covenants/stats", get(covenant_stats))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

fn services_for(state: &AppState, network: &str) -> Result<Arc<NetworkServices>, ApiError> {
    let network = validate_network(network)?;
    state
        .registry
        .get(network)
        .ok_or_else(|| ApiError::NotFound(format!("network {} is not configured", network)))
}

async fn health() -> Response {
    ApiResponse::new(json!({ "status": "ok" })).into_response()
}

// GET /networks/{network}/status handler
async fn network_status(
    State(state): State<Arc<AppState>>,
    Path(network): Path<String>,
) -> Result<Response, ApiError> {
    let services = services_for(&state, &network)?;
    let status = services.status().await?;
    Ok(ApiResponse::new(status).into_response())
}

// POST /networks/{network}/backfill handler
async fn start_backfill(
    State(state): State<Arc<AppState>>,
    Path(network): Path<String>,
    Query(params): Query<BackfillQuery>,
) -> Result<Response, ApiError> {
    let services = services_for(&state, &network)?;
    let (from, target) = validate_backfill_range(&params.from, params.to.as_deref())?;

    info!("Backfill requested for {}: from {} to {:?}", services.network, from, target);

    let concurrency = state.config.backfill_concurrency;
    let backoff = build_backoff(&state.config.rpc);
    let shutdown = state.shutdown.clone();
    let task_services = services.clone();
    tokio::spawn(async move {
        if let Err(e) =
            polling::backfill(&task_services, from, target, concurrency, backoff, &shutdown).await
        {
            error!("Backfill of {} from {} failed: {}", task_services.network, from, e);
        }
    });

    let accepted = BackfillAccepted {
        network: services.network.to_string(),
        from,
        to: match target {
            polling::BackfillTarget::Height(to) => Some(to),
            polling::BackfillTarget::Latest => None,
        },
    };
    Ok(ApiResponse::new(accepted).with_status(StatusCode::ACCEPTED))
}

// GET /networks/{network}/covenants/stats handler
async fn covenant_stats(
    State(state): State<Arc<AppState>>,
    Path(network): Path<String>,
) -> Result<Response, ApiError> {
    let services = services_for(&state, &network)?;
    let stats = services.covenants.member_stats(services.network).await?;
    Ok(ApiResponse::new(stats).into_response())
}
