//! Anonymous trial flow: a 24h session scoped by IP, one resume upload, a
//! rate-limited cover-letter generation, and a polling parse-status check.
//! Trial uploads have no `ResumeRow`; the storage key identifies the parse
//! job and the parsed document.

use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart, State},
    http::{request::Parts, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::documents::DocumentStore;
use crate::errors::AppError;
use crate::models::resume::TrialSessionRow;
use crate::queue::{ParseJob, ParseQueue};
use crate::resumes::handlers::read_upload;
use crate::resumes::store::TrialStore;
use crate::resumes::submit::{is_supported_document, UploadedFile};
use crate::state::AppState;
use crate::storage::{object_key, ObjectStore, SIGNED_URL_TTL};
use crate::trial::limiter::generation_key;

pub const TRIAL_SESSION_HEADER: &str = "x-trial-session";

/// The caller's trial session id, issued by `POST /api/v1/trial/start`.
#[derive(Debug, Clone, Copy)]
pub struct TrialId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TrialId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TRIAL_SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("Trial session not found".to_string()))?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Validation("Invalid trial session id".to_string()))?;
        Ok(TrialId(id))
    }
}

/// Best-effort client address for session records and rate-limit keys.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// POST /api/v1/trial/start
pub async fn handle_start_trial(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let session = TrialSessionRow::new(&client_ip(&headers));
    state.trials.create_session(&session).await?;

    info!("Started trial session {}", session.id);
    Ok(Json(json!({
        "success": true,
        "trialId": session.id,
        "expiresAt": session.expires_at,
        "stepsRemaining": ["resume", "bio", "job"],
    })))
}

/// POST /api/v1/trial/resume
pub async fn handle_trial_upload(
    State(state): State<AppState>,
    TrialId(session_id): TrialId,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let file = read_upload(multipart).await?;
    let file_name = file.file_name.clone();
    let key = submit_trial_resume(
        state.trials.as_ref(),
        state.storage.as_ref(),
        state.queue.as_ref(),
        session_id,
        file,
        &state.config.parse_callback_url(),
    )
    .await?;

    let url = state.storage.presigned_get_url(&key, SIGNED_URL_TTL).await?;
    Ok(Json(json!({
        "success": true,
        "fileName": file_name,
        "fileUrl": url,
    })))
}

/// Stores a trial upload and publishes its parse job. Returns the storage
/// key, which identifies the trial resume from here on.
pub async fn submit_trial_resume(
    trials: &dyn TrialStore,
    storage: &dyn ObjectStore,
    queue: &dyn ParseQueue,
    session_id: Uuid,
    file: UploadedFile,
    callback_url: &str,
) -> Result<String, AppError> {
    let session = trials
        .find_session(session_id)
        .await?
        .ok_or_else(|| AppError::Validation("Trial session not found".to_string()))?;
    if session.is_expired(Utc::now()) {
        return Err(AppError::Validation("Trial session has expired".to_string()));
    }

    if file.bytes.is_empty() {
        return Err(AppError::Validation("No file provided".to_string()));
    }
    if !is_supported_document(&file.file_name, &file.content_type) {
        return Err(AppError::Validation(format!(
            "Unsupported document type '{}'",
            file.content_type
        )));
    }

    let key = object_key("trial", &session_id.to_string(), &file.file_name);
    storage.put(&key, file.bytes, &file.content_type).await?;
    trials.attach_resume(session_id, &key).await?;

    let job = ParseJob {
        resume_id: key.clone(),
        owner_id: session_id.to_string(),
        storage_key: key.clone(),
        callback_url: callback_url.to_string(),
        retries: 0,
    };
    queue.publish(&job).await?;

    info!("Trial session {session_id} submitted resume {key}");
    Ok(key)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
}

/// Returns the names of required fields that are missing or blank.
pub fn missing_fields(req: &GenerateRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank(&req.bio) {
        missing.push("bio");
    }
    if blank(&req.job_title) {
        missing.push("jobTitle");
    }
    if blank(&req.company) {
        missing.push("company");
    }
    if blank(&req.job_description) {
        missing.push("jobDescription");
    }
    missing
}

/// POST /api/v1/trial/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    TrialId(session_id): TrialId,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    let missing = missing_fields(&req);
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    state
        .limiter
        .check(&generation_key(&client_ip(&headers), session_id))
        .await?;

    let session = state
        .trials
        .find_session(session_id)
        .await?
        .ok_or_else(|| AppError::Validation("Trial session not found".to_string()))?;
    if session.is_expired(Utc::now()) {
        return Err(AppError::Validation("Trial session has expired".to_string()));
    }
    let resume_key = session
        .resume_id
        .ok_or_else(|| AppError::Validation("Resume not found for trial".to_string()))?;

    let parsed = state
        .documents
        .find(&resume_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Parsed resume data not found".to_string()))?;

    let prompt = format!(
        "Please create a cover letter for {}, position {} with job description: \"{}\" \
         for a candidate with bio: \"{}\" and resume: \"{}\". Please keep the cover letter \
         under 2000 letters and have it address the job description provided with references \
         to the provided resume and bio.",
        req.company.as_deref().unwrap_or_default(),
        req.job_title.as_deref().unwrap_or_default(),
        req.job_description.as_deref().unwrap_or_default(),
        req.bio.as_deref().unwrap_or_default(),
        parsed.data.raw_text,
    );

    let cover_letter = state
        .llm
        .generate(&prompt)
        .await
        .map_err(|e| AppError::Llm(format!("Cover letter generation failed: {e}")))?;

    Ok(Json(json!({
        "success": true,
        "coverLetter": cover_letter,
    })))
}

/// GET /api/v1/trial/parse-status
///
/// Trial resumes have no status row; "parsed" is derived from document
/// presence, so polling is safe and side-effect free.
pub async fn handle_parse_status(
    State(state): State<AppState>,
    TrialId(session_id): TrialId,
) -> Result<Json<Value>, AppError> {
    let status = read_trial_parse_status(
        state.trials.as_ref(),
        state.documents.as_ref(),
        session_id,
    )
    .await?;
    Ok(Json(json!({ "status": status })))
}

pub async fn read_trial_parse_status(
    trials: &dyn TrialStore,
    documents: &dyn DocumentStore,
    session_id: Uuid,
) -> Result<&'static str, AppError> {
    let session = trials
        .find_session(session_id)
        .await?
        .ok_or_else(|| AppError::Validation("Trial session not found".to_string()))?;
    let resume_key = session
        .resume_id
        .ok_or_else(|| AppError::NotFound("Resume not found for trial".to_string()))?;

    Ok(match documents.find(&resume_key).await? {
        Some(_) => "completed",
        None => "pending",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::memory::InMemoryDocumentStore;
    use crate::models::parsed::{ParsedResumeDocument, PARSED_SCHEMA_VERSION};
    use crate::queue::recording::RecordingQueue;
    use crate::resumes::store::memory::InMemoryStore;
    use crate::storage::memory::InMemoryStorage;

    const CALLBACK: &str = "http://api/api/v1/notifications/parse-complete";

    fn pdf() -> UploadedFile {
        UploadedFile {
            file_name: "cv.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[test]
    fn test_missing_fields_reported_by_name() {
        let req = GenerateRequest {
            bio: Some("engineer".into()),
            job_title: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(missing_fields(&req), vec!["jobTitle", "company", "jobDescription"]);

        let complete = GenerateRequest {
            bio: Some("engineer".into()),
            job_title: Some("Dev".into()),
            company: Some("Acme".into()),
            job_description: Some("Build things".into()),
        };
        assert!(missing_fields(&complete).is_empty());
    }

    #[tokio::test]
    async fn test_trial_upload_attaches_key_and_publishes_job() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let queue = RecordingQueue::default();

        let session = TrialSessionRow::new("203.0.113.9");
        store.create_session(&session).await.unwrap();

        let key = submit_trial_resume(&store, &storage, &queue, session.id, pdf(), CALLBACK)
            .await
            .unwrap();

        assert!(key.starts_with("trial/"));
        assert!(storage.contains(&key));
        let updated = store.find_session(session.id).await.unwrap().unwrap();
        assert_eq!(updated.resume_id.as_deref(), Some(key.as_str()));

        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].resume_id, key);
        assert_eq!(jobs[0].owner_id, session.id.to_string());
    }

    #[tokio::test]
    async fn test_expired_session_upload_rejected_with_nothing_enqueued() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let queue = RecordingQueue::default();

        let mut session = TrialSessionRow::new("203.0.113.9");
        session.expires_at = Utc::now() - chrono::Duration::hours(1);
        store.create_session(&session).await.unwrap();

        let err = submit_trial_resume(&store, &storage, &queue, session.id, pdf(), CALLBACK)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(queue.jobs().is_empty());
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_upload_rejected() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let queue = RecordingQueue::default();

        let err = submit_trial_resume(&store, &storage, &queue, Uuid::new_v4(), pdf(), CALLBACK)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_parse_status_pending_until_document_lands() {
        let store = InMemoryStore::default();
        let documents = InMemoryDocumentStore::default();

        let session = TrialSessionRow::new("203.0.113.9");
        store.create_session(&session).await.unwrap();
        let key = format!("trial/{}/1-cv.pdf", session.id);
        store.attach_resume(session.id, &key).await.unwrap();

        assert_eq!(
            read_trial_parse_status(&store, &documents, session.id)
                .await
                .unwrap(),
            "pending"
        );

        documents
            .upsert(&ParsedResumeDocument {
                resume_id: key,
                owner_id: session.id.to_string(),
                data: Default::default(),
                confidence: 0.5,
                schema_version: PARSED_SCHEMA_VERSION,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(
            read_trial_parse_status(&store, &documents, session.id)
                .await
                .unwrap(),
            "completed"
        );
    }
}
