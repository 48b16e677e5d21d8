use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::ResultReport;
use crate::models::job::{CompressionJob, JobHandle, ObjectId};
use crate::models::requests::{
    CheckResponse, CompressRequest, ListQuery, ObjectCreatedRequest, SubmittedResponse,
};
use crate::services::compressor::{SubmitError, SubmitOptions};
use crate::services::reconcile::CheckError;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

fn submitted(object_id: ObjectId, handle: JobHandle) -> SubmittedResponse {
    SubmittedResponse {
        object_id,
        job_id: Some(handle.job_id),
        queue_position: handle.queue_position,
        estimated_time: handle.estimated_time.map(|d| d.as_secs()),
        message: "Compression job queued".to_string(),
    }
}

fn submit_error_status(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::UnresolvedSource(_) => StatusCode::NOT_FOUND,
        SubmitError::AlreadyPending(_) => StatusCode::CONFLICT,
        SubmitError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// POST /api/v1/objects — Register a new object and fire the object-created event.
pub async fn object_created(
    State(state): State<AppState>,
    Json(request): Json<ObjectCreatedRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), StatusCode> {
    request.validate().map_err(|_| StatusCode::BAD_REQUEST)?;

    state
        .jobs
        .register_source(request.object_id, &request.source_url)
        .await
        .map_err(|e| {
            tracing::error!(object_id = %request.object_id, error = %e, "Failed to register object source");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match state
        .events
        .on_object_created(request.object_id, &request.mime_type)
        .await
    {
        Ok(Some(handle)) => Ok((
            StatusCode::ACCEPTED,
            Json(submitted(request.object_id, handle)),
        )),
        Ok(None) => Ok((
            StatusCode::OK,
            Json(SubmittedResponse {
                object_id: request.object_id,
                job_id: None,
                queue_position: None,
                estimated_time: None,
                message: "Object not submitted for compression".to_string(),
            }),
        )),
        Err(e) => Err(submit_error_status(&e)),
    }
}

/// POST /api/v1/objects/{object_id}/compress — Submit an object with an explicit kind.
pub async fn compress_object(
    State(state): State<AppState>,
    Path(object_id): Path<ObjectId>,
    Json(request): Json<CompressRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), StatusCode> {
    request.validate().map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut options = SubmitOptions::with_quality(request.quality.unwrap_or(state.default_quality));
    if let Some(variants) = request.variants {
        options.variants = variants;
    }

    let handle = state
        .submitter
        .submit(object_id, request.kind, &options)
        .await
        .map_err(|e| submit_error_status(&e))?;

    Ok((StatusCode::ACCEPTED, Json(submitted(object_id, handle))))
}

/// POST /api/v1/objects/{object_id}/check — Re-check one job against the remote service now.
pub async fn check_object(
    State(state): State<AppState>,
    Path(object_id): Path<ObjectId>,
) -> Result<Json<CheckResponse>, StatusCode> {
    match state.reconciler.check(object_id).await {
        Ok(status) => Ok(Json(CheckResponse { object_id, status })),
        Err(CheckError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(CheckError::Unavailable) => Err(StatusCode::BAD_GATEWAY),
    }
}

/// GET /api/v1/objects/{object_id} — Stored job state, including the result once completed.
pub async fn get_object_job(
    State(state): State<AppState>,
    Path(object_id): Path<ObjectId>,
) -> Result<Json<CompressionJob>, StatusCode> {
    match state.jobs.load(object_id).await {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(object_id = %object_id, error = %e, "Failed to load compression job");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/objects/{object_id}/result — Fetch the remote result for the object's job.
///
/// Reads through to the compression service and stores nothing.
pub async fn get_object_result(
    State(state): State<AppState>,
    Path(object_id): Path<ObjectId>,
) -> Result<Json<ResultReport>, StatusCode> {
    let job = match state.jobs.load(object_id).await {
        Ok(Some(job)) => job,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(object_id = %object_id, error = %e, "Failed to load compression job");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    state.client.get_result(&job.job_id).await.map(Json).map_err(|e| {
        tracing::warn!(object_id = %object_id, job_id = %job.job_id, error = %e, "Result fetch failed");
        StatusCode::BAD_GATEWAY
    })
}

/// GET /api/v1/jobs — All recorded jobs, lowest object id first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CompressionJob>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    state.jobs.list(limit).await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to list compression jobs");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
