//! Axum-based HTTP server for the metro simulation.
//!
//! Provides REST endpoints for:
//! - GET `/api/map` - Rendered map, entrances and occupancy
//! - GET `/api/field/:row/:col` - One tile in detail
//! - GET `/api/trains` - State of every train
//! - POST `/api/start` - Launch the train units
//! - POST `/api/pause` - Pause every train before its next move
//! - POST `/api/restart` - Resume paused trains
//! - POST `/api/end` - Stop, join and clear the map

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use tower_http::cors::{Any, CorsLayer};

use crate::{Coordinates, SimulationController, TrainState};

use super::api::{ApiResponse, CommandResponse, EndResponse, FieldResponse, MapResponse};
use super::shared::SharedSimulation;

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/map
async fn get_map(State(state): State<Arc<SharedSimulation>>) -> Json<ApiResponse<MapResponse>> {
    Json(ApiResponse::ok(state.map()))
}

/// GET /api/field/:row/:col
async fn get_field(
    State(state): State<Arc<SharedSimulation>>,
    Path((row, col)): Path<(usize, usize)>,
) -> impl IntoResponse {
    match state.field(Coordinates::new(row, col)) {
        Some(field) => (StatusCode::OK, Json(ApiResponse::ok(field))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<FieldResponse>::err(format!(
                "({row}, {col}) is outside the map"
            ))),
        ),
    }
}

/// GET /api/trains
async fn get_trains(
    State(state): State<Arc<SharedSimulation>>,
) -> Json<ApiResponse<Vec<TrainState>>> {
    let trains = tokio::task::spawn_blocking(move || state.trains()).await;
    match trains {
        Ok(trains) => Json(ApiResponse::ok(trains)),
        Err(_) => Json(ApiResponse::err("Train state task failed")),
    }
}

/// POST /api/start
///
/// Start may sleep between launches, so it runs off the async workers.
async fn start(State(state): State<Arc<SharedSimulation>>) -> Json<ApiResponse<CommandResponse>> {
    let result = tokio::task::spawn_blocking(move || {
        state.with_controller(|sim| {
            sim.start()
                .map(|()| CommandResponse::new("start", sim.phase(), sim.number_of_trains()))
        })
    })
    .await;

    match result {
        Ok(Ok(response)) => Json(ApiResponse::ok(response)),
        Ok(Err(e)) => Json(ApiResponse::err(e.to_string())),
        Err(_) => Json(ApiResponse::err("Start task failed")),
    }
}

/// POST /api/pause
async fn pause(State(state): State<Arc<SharedSimulation>>) -> Json<ApiResponse<CommandResponse>> {
    lifecycle(state, "pause", SimulationController::pause).await
}

/// POST /api/restart
async fn restart(State(state): State<Arc<SharedSimulation>>) -> Json<ApiResponse<CommandResponse>> {
    lifecycle(state, "restart", SimulationController::restart).await
}

async fn lifecycle(
    state: Arc<SharedSimulation>,
    action: &'static str,
    apply: fn(&SimulationController) -> usize,
) -> Json<ApiResponse<CommandResponse>> {
    let result = tokio::task::spawn_blocking(move || {
        state.with_controller(|sim| CommandResponse::new(action, sim.phase(), apply(sim)))
    })
    .await;

    match result {
        Ok(response) => Json(ApiResponse::ok(response)),
        Err(_) => Json(ApiResponse::err("Lifecycle task failed")),
    }
}

/// POST /api/end
///
/// Joins every train thread before answering.
async fn end(State(state): State<Arc<SharedSimulation>>) -> Json<ApiResponse<EndResponse>> {
    let result = tokio::task::spawn_blocking(move || state.with_controller(|sim| sim.end())).await;

    match result {
        Ok(Ok(report)) => Json(ApiResponse::ok(EndResponse::from(&report))),
        Ok(Err(e)) => Json(ApiResponse::err(e.to_string())),
        Err(_) => {
            warn!("end task failed");
            Json(ApiResponse::err("End task failed"))
        }
    }
}

/// Fallback handler for 404
async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::err("Not found")),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Address to bind to
    pub addr: SocketAddr,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cors_permissive: true,
        }
    }
}

impl WebServerConfig {
    /// Create a new config with the given address
    pub fn new(addr: impl Into<SocketAddr>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Set whether CORS should be permissive
    pub fn cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: Arc<SharedSimulation>, config: &WebServerConfig) -> Router {
    let mut router = Router::new()
        .route("/api/map", get(get_map))
        .route("/api/field/:row/:col", get(get_field))
        .route("/api/trains", get(get_trains))
        .route("/api/start", post(start))
        .route("/api/pause", post(pause))
        .route("/api/restart", post(restart))
        .route("/api/end", post(end))
        .fallback(not_found)
        .with_state(state);

    if config.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Serve `controller` until the server shuts down.
///
/// Creates its own [`SharedSimulation`]; use [`run_server_with_state`] to
/// keep a handle on the run.
pub async fn run_server(
    controller: SimulationController,
    config: WebServerConfig,
) -> Result<(), std::io::Error> {
    run_server_with_state(Arc::new(SharedSimulation::new(controller)), config).await
}

/// Serve an existing shared simulation.
pub async fn run_server_with_state(
    state: Arc<SharedSimulation>,
    config: WebServerConfig,
) -> Result<(), std::io::Error> {
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("web server listening on http://{}", config.addr);

    axum::serve(listener, router).await
}
