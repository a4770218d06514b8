//! Workflow control routes: start, resume, poll.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use reportsmith_common::{AttachedFile, Plan, ReportInput, ReportsmithError};
use reportsmith_workflow::ResumeDecision;

use crate::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, message: String) -> ApiError {
    (status, Json(serde_json::json!({ "error": message })))
}

fn map_error(e: ReportsmithError) -> ApiError {
    let status = match &e {
        ReportsmithError::Validation(_) => StatusCode::BAD_REQUEST,
        ReportsmithError::RunNotFound(_) => StatusCode::NOT_FOUND,
        ReportsmithError::InvalidResume(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ---------------------------------------------------------------------------
// POST /api/workflow/start
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    report_id: String,
    user_context: String,
    #[serde(default)]
    attached_files: Vec<AttachedFileBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedFileBody {
    filename: String,
    content_type: String,
    /// Base64-encoded file bytes.
    data: String,
}

pub async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut attached_files = Vec::with_capacity(request.attached_files.len());
    for file in request.attached_files {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&file.data)
            .map_err(|e| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid base64 in {}: {e}", file.filename),
                )
            })?;
        attached_files.push(AttachedFile {
            filename: file.filename,
            content_type: file.content_type,
            bytes,
        });
    }

    let input = ReportInput {
        report_id: request.report_id,
        user_context: request.user_context,
        attached_files,
    };

    let outcome = state.service.start(input).await.map_err(map_error)?;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

// ---------------------------------------------------------------------------
// POST /api/workflow/resume
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    run_id: Uuid,
    #[serde(default = "approval_step")]
    step_id: String,
    decision: DecisionBody,
}

fn approval_step() -> String {
    "approve_plan".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionBody {
    approved: bool,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    modified_plan: Option<Plan>,
}

pub async fn resume_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let decision = ResumeDecision {
        approved: request.decision.approved,
        feedback: request.decision.feedback,
        modified_plan: request.decision.modified_plan,
    };

    let outcome = state
        .service
        .resume(request.run_id, &request.step_id, decision)
        .await
        .map_err(map_error)?;

    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}

// ---------------------------------------------------------------------------
// GET /api/workflow/{run_id}
// ---------------------------------------------------------------------------

pub async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.cancel(run_id).await.map_err(map_error)?;
    Ok(Json(serde_json::json!({ "status": "cancelled" })))
}

/// The UI polling path: reads the mirrored record, not the authoritative
/// snapshot.
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .records
        .get_run_record(run_id)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("Run not found: {run_id}"))
        })?;

    Ok(Json(serde_json::to_value(record).unwrap_or_default()))
}
