//! Axum route handlers for templates, models, credentials and runs.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::KNOWN_MODELS;
use crate::pipeline::orchestrator::GenerationRequest;
use crate::pipeline::runner::{start_run, RunSnapshot};
use crate::state::AppState;
use crate::templates::classifier::classify;
use crate::templates::Template;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<Template>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub template: String,
    pub job_description: String,
    pub company_name: String,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub run_id: Option<Uuid>,
    pub cancelled: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/templates
///
/// Every template in the store, classified, with its declared slots.
pub async fn handle_list_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplateListResponse>, AppError> {
    let mut templates = Vec::new();
    for identifier in state.templates.list().await? {
        let text = state.templates.load(&identifier).await?;
        templates.push(classify(&identifier, &text));
    }
    Ok(Json(TemplateListResponse { templates }))
}

/// GET /api/v1/models
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    Json(ModelListResponse {
        models: KNOWN_MODELS
            .iter()
            .map(|&(id, label)| ModelInfo { id, label })
            .collect(),
        default: state.config.model.clone(),
    })
}

/// POST /api/v1/credentials/verify
///
/// Sends a minimal request with the configured key. 401 when it is missing or rejected.
pub async fn handle_verify_credentials(
    State(state): State<AppState>,
) -> Result<Json<VerifyResponse>, AppError> {
    state.model.verify(VERIFY_TIMEOUT).await?;
    Ok(Json(VerifyResponse { valid: true }))
}

/// POST /api/v1/runs
///
/// Validates input, loads the template and starts a background run.
/// Returns 202 with the run ID; 409 while another run is in flight.
pub async fn handle_start_run(
    State(state): State<AppState>,
    Json(request): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>), AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation("job_description cannot be empty".to_string()));
    }
    if request.company_name.trim().is_empty() {
        return Err(AppError::Validation("company_name cannot be empty".to_string()));
    }

    let text = state.templates.load(&request.template).await?;
    let model_id = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.model.clone());

    let generation = GenerationRequest::new(
        request.template,
        text,
        &request.job_description,
        request.company_name.trim(),
        model_id,
    );

    let run_id = start_run(
        &state.runs,
        state.orchestrator.clone(),
        state.outputs.clone(),
        generation,
    )?;

    Ok((StatusCode::ACCEPTED, Json(StartRunResponse { run_id })))
}

/// GET /api/v1/runs/current
pub async fn handle_current_run(State(state): State<AppState>) -> Result<Json<RunSnapshot>, AppError> {
    state
        .runs
        .latest()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No run has been started".to_string()))
}

/// POST /api/v1/runs/current/cancel
///
/// Flags the active run; it stops at the next stage boundary.
pub async fn handle_cancel_run(State(state): State<AppState>) -> Json<CancelResponse> {
    let run_id = state.runs.cancel();
    Json(CancelResponse {
        run_id,
        cancelled: run_id.is_some(),
    })
}
