use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Owner;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::resumes::submit::{
    delete_resume, read_parse_status, submit_parse_job, upload_resume, ParseStatusResponse,
    UploadedFile,
};
use crate::state::AppState;
use crate::storage::SIGNED_URL_TTL;

/// Multipart field carrying the uploaded document.
const FILE_FIELD: &str = "resume";

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    Ok(Json(state.resumes.list_for_owner(owner_id).await?))
}

/// POST /api/v1/resumes
pub async fn handle_upload(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    let file = read_upload(multipart).await?;
    let row = upload_resume(state.resumes.as_ref(), state.storage.as_ref(), owner_id, file).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    delete_resume(
        state.resumes.as_ref(),
        state.documents.as_ref(),
        state.storage.as_ref(),
        owner_id,
        id,
    )
    .await?;
    Ok(Json(json!({ "message": "Resume deleted successfully" })))
}

/// GET /api/v1/resumes/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let resume = state
        .resumes
        .find_owned(id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    let url = state
        .storage
        .presigned_get_url(&resume.file_key, SIGNED_URL_TTL)
        .await?;
    Ok(Json(json!({ "url": url })))
}

/// POST /api/v1/resumes/:id/parse
pub async fn handle_submit_parse(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    submit_parse_job(
        state.resumes.as_ref(),
        state.queue.as_ref(),
        owner_id,
        id,
        &state.config.parse_callback_url(),
    )
    .await?;
    Ok(Json(json!({ "message": "Parse request submitted" })))
}

/// GET /api/v1/resumes/:id/parse-status
pub async fn handle_parse_status(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<ParseStatusResponse>, AppError> {
    let status = read_parse_status(
        state.resumes.as_ref(),
        state.documents.as_ref(),
        owner_id,
        id,
    )
    .await?;
    Ok(Json(status))
}

/// Pulls the resume file out of the multipart body.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(String::from)
            .ok_or_else(|| AppError::Validation("Missing file name".to_string()))?;
        let content_type = field
            .content_type()
            .map(String::from)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?
            .to_vec();
        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::Validation("No file provided".to_string()))
}
