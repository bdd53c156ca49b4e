//! HTTP surface for the dashboard: trigger, poll, and ad-hoc scoring.

use crate::auth::{AuthResponse, AuthUser, JwtSecret};
use crate::models::{AnalysisResult, Method, SentimentLabel};
use crate::recalc::{Engine, RunSnapshot, RunState, StartOutcome};
use crate::stats::RunStats;
use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub struct AppState {
    pub engine: Engine,
    pub jwt_secret: JwtSecret,
}

impl FromRef<Arc<AppState>> for JwtSecret {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.jwt_secret.clone()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecalcResponse {
    pub started: bool,
    pub snapshot: RunSnapshot,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    #[schema(example = "aplikasi ini lemot banget")]
    pub text: Option<String>,
    #[schema(example = 2)]
    pub rating: Option<i32>,
}

#[derive(OpenApi)]
#[openapi(
    paths(trigger_recalculation, trigger_store_recompute, recalculation_status, analyze_text),
    components(schemas(
        RecalcResponse,
        AnalyzeRequest,
        AnalysisResult,
        AuthResponse,
        RunSnapshot,
        RunState,
        RunStats,
        Method,
        SentimentLabel
    )),
    tags((name = "sentiment", description = "Sentiment recalculation API"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/sentiment-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/sentiment/recalculate", post(trigger_recalculation))
        .route("/sentiment/recalculate/store", post(trigger_store_recompute))
        .route("/sentiment/recalculate/status", get(recalculation_status))
        .route("/sentiment/analyze", post(analyze_text))
        .with_state(state)
}

type ApiError = (StatusCode, Json<AuthResponse>);

fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(AuthResponse {
            message: "Recalculation requires the admin or service_role role".to_string(),
        }),
    )
}

fn respond(engine: &Engine, outcome: StartOutcome) -> (StatusCode, Json<RecalcResponse>) {
    let started = outcome.is_started();
    let (status, message) = if started {
        (StatusCode::ACCEPTED, "Recalculation started")
    } else {
        (StatusCode::OK, "Recalculation already running")
    };
    (
        status,
        Json(RecalcResponse {
            started,
            snapshot: engine.snapshot(),
            message: message.to_string(),
        }),
    )
}

/// Start an incremental recalculation (no-op while one is running)
#[utoipa::path(
    post,
    path = "/sentiment/recalculate",
    tag = "sentiment",
    responses(
        (status = 202, description = "Run started", body = RecalcResponse),
        (status = 200, description = "A run is already in progress", body = RecalcResponse),
        (status = 401, description = "Missing or invalid token", body = AuthResponse),
        (status = 403, description = "Role may not recalculate", body = AuthResponse)
    ),
    security(("bearer" = []))
)]
pub async fn trigger_recalculation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<RecalcResponse>), ApiError> {
    if !user.can_recalculate() {
        return Err(forbidden());
    }
    tracing::info!("👤 Recalculation requested by {}", user.id);
    let outcome = state.engine.start();
    Ok(respond(&state.engine, outcome))
}

/// Delegate a full recompute to the database function
#[utoipa::path(
    post,
    path = "/sentiment/recalculate/store",
    tag = "sentiment",
    responses(
        (status = 202, description = "Run started", body = RecalcResponse),
        (status = 200, description = "A run is already in progress", body = RecalcResponse),
        (status = 401, description = "Missing or invalid token", body = AuthResponse),
        (status = 403, description = "Role may not recalculate", body = AuthResponse)
    ),
    security(("bearer" = []))
)]
pub async fn trigger_store_recompute(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<RecalcResponse>), ApiError> {
    if !user.can_recalculate() {
        return Err(forbidden());
    }
    tracing::info!("👤 Store-side recompute requested by {}", user.id);
    let outcome = state.engine.start_store_side();
    Ok(respond(&state.engine, outcome))
}

/// Progress, stats and last message of the current or last run
#[utoipa::path(
    get,
    path = "/sentiment/recalculate/status",
    tag = "sentiment",
    responses((status = 200, description = "Current run snapshot", body = RunSnapshot))
)]
pub async fn recalculation_status(State(state): State<Arc<AppState>>) -> Json<RunSnapshot> {
    Json(state.engine.snapshot())
}

/// Score a single text/rating pair without touching the store
#[utoipa::path(
    post,
    path = "/sentiment/analyze",
    tag = "sentiment",
    request_body = AnalyzeRequest,
    responses((status = 200, description = "Analysis result", body = AnalysisResult))
)]
pub async fn analyze_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<AnalysisResult> {
    Json(
        state
            .engine
            .analyzer()
            .analyze_text(req.text.as_deref(), req.rating),
    )
}
