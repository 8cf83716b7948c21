// HTTP route handlers for the Gavel API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gavel_common::redis;
use gavel_common::types::{GradeRequest, RunRequest, Submission};
use gavel_engine::JudgeConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Turn a request into a fresh Pending submission, filling in default limits
pub fn build_submission(request: GradeRequest, config: &JudgeConfig) -> Result<Submission, String> {
    if request.test_cases.is_empty() {
        return Err("At least one test case is required".to_string());
    }
    let time_limit_ms = request.time_limit_ms.unwrap_or(config.default_time_limit_ms);
    let memory_limit_mb = request.memory_limit_mb.unwrap_or(config.default_memory_limit_mb);
    if time_limit_ms == 0 || memory_limit_mb == 0 {
        return Err("Limits must be positive".to_string());
    }

    Ok(Submission::new(
        request.language,
        request.source_code,
        request.test_cases,
        time_limit_ms,
        memory_limit_mb,
    ))
}

/// POST /submissions - Store a Pending submission and queue it for grading
pub async fn submit_grade(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GradeRequest>,
) -> Response {
    let submission = match build_submission(payload, state.judge.config()) {
        Ok(submission) => submission,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let mut conn = state.redis.clone();

    // The record must exist before a worker can pop its id
    if let Err(e) = redis::store_submission(&mut conn, &submission, state.result_ttl).await {
        error!(submission_id = %submission.id, error = %e, "Failed to store submission");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to store submission: {}", e));
    }

    match redis::push_job(&mut conn, &submission.id).await {
        Ok(()) => {
            info!(
                submission_id = %submission.id,
                language = %submission.language,
                test_cases = submission.total_test_cases,
                "Submission queued"
            );
            (
                StatusCode::CREATED,
                Json(SubmitResponse { submission_id: submission.id }),
            ).into_response()
        }
        Err(e) => {
            error!(submission_id = %submission.id, error = %e, "Failed to queue submission");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to queue submission: {}", e))
        }
    }
}

/// GET /submissions/{id} - Current grading state
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid submission ID format");
    };

    let mut conn = state.redis.clone();
    match redis::get_submission(&mut conn, &id).await {
        Ok(Some(submission)) => (StatusCode::OK, Json(submission.to_response())).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Submission not found"),
        Err(e) => {
            error!(submission_id = %id, error = %e, "Failed to fetch submission");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to query submission: {}", e))
        }
    }
}

/// POST /run - Compile and run once against custom input, no grading
pub async fn run_adhoc(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> impl IntoResponse {
    let response = state
        .judge
        .run_once(payload.language, &payload.source_code, &payload.input)
        .await;

    info!(
        language = %payload.language,
        status = ?response.status,
        elapsed_ms = response.execution_time_ms,
        "Ad-hoc run finished"
    );

    (StatusCode::OK, Json(response))
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
