use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use stampa_api_types::{RenderSubmitRequest, RenderSubmitResponse};

use crate::application::queue::QueueError;
use crate::application::render::content_type_for;
use crate::application::store::{NewJob, StoreError};
use crate::domain::job::{JobInput, JobState, RenderOptions};

use super::error::ApiError;
use super::models::status_response;
use super::state::ApiState;

/// Hint given to submitters bounced by a full queue.
const RETRY_AFTER_SECONDS: u64 = 5;

/// `POST /api/v1/render` — validate, persist as `Queued`, enqueue, return
/// the job id without waiting for execution.
pub async fn submit_render(
    State(state): State<ApiState>,
    Json(request): Json<RenderSubmitRequest>,
) -> Result<Response, ApiError> {
    let input = JobInput::new(request.input_type.into(), request.content)
        .map_err(|err| ApiError::invalid_input(err.to_string()))?;
    let options = RenderOptions::new(request.options.format, request.options.extra)
        .map_err(|err| ApiError::invalid_input(err.to_string()))?;

    let job = state
        .store
        .create(NewJob { input, options })
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    if let Err(err) = state.queue.enqueue(job.id) {
        // The submission never happened from the caller's view, so the
        // just-created record must not linger as a permanently queued job.
        if let Err(discard_err) = state.store.discard(job.id).await {
            warn!(
                target = "infra::http::api",
                job_id = %job.id,
                error = %discard_err,
                "failed to roll back rejected submission"
            );
        }

        return match err {
            QueueError::Full => {
                counter!("stampa_jobs_rejected_total").increment(1);
                debug!(
                    target = "infra::http::api",
                    job_id = %job.id,
                    "queue full; submission rejected"
                );
                Ok(ApiError::overloaded(RETRY_AFTER_SECONDS))
            }
            QueueError::Closed => Err(ApiError::internal("render queue is closed")),
        };
    }

    counter!("stampa_jobs_submitted_total").increment(1);
    Ok((
        StatusCode::ACCEPTED,
        Json(RenderSubmitResponse { job_id: job.id }),
    )
        .into_response())
}

/// `GET /api/v1/status/{job_id}` — current state plus, once terminal, the
/// artifact reference or failure reason. Terminal reads are idempotent.
pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.store.get(job_id).await.map_err(|err| match err {
        StoreError::NotFound => ApiError::not_found("Unknown job id"),
        other => ApiError::internal(other.to_string()),
    })?;

    Ok(Json(status_response(&job)).into_response())
}

/// `GET /api/v1/download/{job_id}` — artifact bytes for a completed job.
/// Queued/processing answer 409; failed and unknown jobs answer 404.
pub async fn download_artifact(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.store.get(job_id).await.map_err(|err| match err {
        StoreError::NotFound => ApiError::not_found("Unknown job id"),
        other => ApiError::internal(other.to_string()),
    })?;

    match job.state {
        JobState::Queued | JobState::Processing => Err(ApiError::not_ready()),
        JobState::Failed => Err(ApiError::not_found("Job failed; no artifact available")),
        JobState::Completed => {
            let reference = job
                .result
                .as_ref()
                .ok_or_else(|| ApiError::internal("completed job without artifact reference"))?;
            let bytes = state
                .artifacts
                .read(reference)
                .await
                .map_err(|err| ApiError::internal(err.to_string()))?;

            let content_type = content_type_for(&job.options.format);
            let filename = reference
                .as_str()
                .rsplit('/')
                .next()
                .unwrap_or("artifact")
                .to_string();

            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
    }
}

/// `GET /api/v1/healthz` — liveness.
pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    // A string that is not a UUID can never name a job.
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found("Unknown job id"))
}
