use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::applicant::{Applicant, OverallStatus, SourceKind, StageStatus, TransitionError};
use crate::coordinator::Coordinator;
use crate::signals::{catalog, evaluate_all_signals, Signal, SignalContext, SignalReport};
use crate::tiering::is_eligible_for_full_analysis;

#[derive(Clone)]
pub struct AppState {
    coordinator: Coordinator,
}

pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/signals", get(list_signals))
        .route("/signals/evaluate", post(evaluate_signals))
        .route("/applicants", post(create_applicant))
        .route("/applicants/{id}", get(get_applicant))
        .route("/applicants/{id}/sources/{source}", post(write_source))
        .route("/applicants/{id}/reanalyze", post(reanalyze))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { coordinator })
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<TransitionError>() {
            Some(TransitionError::UnknownApplicant(_)) => Self::NotFound(err.to_string()),
            Some(
                TransitionError::MissingData(_)
                | TransitionError::UnexpectedData(_)
                | TransitionError::NotProvidedNotAllowed(_),
            ) => Self::BadRequest(err.to_string()),
            Some(_) => Self::Conflict(err.to_string()),
            None => Self::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Applicant plus everything derived from it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicantView {
    #[serde(flatten)]
    applicant: Applicant,
    status: OverallStatus,
    tier_score: u8,
    eligible: bool,
}

impl From<Applicant> for ApplicantView {
    fn from(applicant: Applicant) -> Self {
        let tier_score = applicant.tier_score();
        Self {
            status: applicant.overall_status(),
            tier_score,
            eligible: is_eligible_for_full_analysis(tier_score),
            applicant,
        }
    }
}

async fn list_signals() -> Json<&'static [Signal]> {
    Json(catalog())
}

#[derive(Deserialize)]
struct EvaluateReq {
    #[serde(flatten)]
    context: SignalContext,
    #[serde(default)]
    threshold: Option<f32>,
}

async fn evaluate_signals(
    State(state): State<AppState>,
    Json(body): Json<EvaluateReq>,
) -> Json<SignalReport> {
    let pipeline = state.coordinator.pipeline();
    let threshold = body
        .threshold
        .filter(|t| t.is_finite())
        .map(|t| t.clamp(0.0, 1.0))
        .unwrap_or(pipeline.high_risk_threshold());
    let results = evaluate_all_signals(pipeline.judge().clone(), &body.context).await;
    Json(SignalReport::from_results(results, threshold))
}

#[derive(Deserialize)]
struct IntakeReq {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    linkedin_requested: bool,
    #[serde(default)]
    github_requested: bool,
}

async fn create_applicant(
    State(state): State<AppState>,
    Json(body): Json<IntakeReq>,
) -> Result<(StatusCode, Json<ApplicantView>), ApiError> {
    let applicant = state
        .coordinator
        .intake(body.name, body.linkedin_requested, body.github_requested)
        .await?;
    Ok((StatusCode::CREATED, Json(applicant.into())))
}

async fn get_applicant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApplicantView>, ApiError> {
    Ok(Json(state.coordinator.read(&id).await?.into()))
}

#[derive(Deserialize)]
struct SourceStatusReq {
    status: StageStatus,
    #[serde(default)]
    data: Option<Value>,
}

async fn write_source(
    State(state): State<AppState>,
    Path((id, source)): Path<(String, String)>,
    Json(body): Json<SourceStatusReq>,
) -> Result<Json<ApplicantView>, ApiError> {
    let source: SourceKind = source.parse().map_err(ApiError::BadRequest)?;
    let applicant = state
        .coordinator
        .on_source_status(&id, source, body.status, body.data)
        .await?;
    Ok(Json(applicant.into()))
}

async fn reanalyze(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApplicantView>, ApiError> {
    Ok(Json(state.coordinator.reanalyze(&id).await?.into()))
}
