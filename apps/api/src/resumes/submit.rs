//! Job Submitter and Status Reader logic, separated from the Axum handlers
//! so it runs against in-memory stores in tests.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::documents::DocumentStore;
use crate::errors::AppError;
use crate::models::parsed::ParsedResumeData;
use crate::models::resume::{ResumeRow, ResumeStatus};
use crate::queue::{ParseJob, ParseQueue};
use crate::resumes::store::ResumeStore;
use crate::storage::{object_key, ObjectStore};

/// Per-owner cap on stored resumes. Exceeding it rejects the upload; it
/// never replaces an older version.
pub const MAX_RESUMES: i64 = 5;

const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx"];

/// A resume upload must be a recognized document type, by content type or
/// by file extension.
pub fn is_supported_document(file_name: &str, content_type: &str) -> bool {
    if SUPPORTED_CONTENT_TYPES.contains(&content_type) {
        return true;
    }
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Persists an upload: object write, then a `ResumeRow` in UPLOADED.
/// Quota and type validation happen before any state mutation.
pub async fn upload_resume(
    resumes: &dyn ResumeStore,
    storage: &dyn ObjectStore,
    owner_id: Uuid,
    file: UploadedFile,
) -> Result<ResumeRow, AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::Validation("No file provided".to_string()));
    }
    if !is_supported_document(&file.file_name, &file.content_type) {
        return Err(AppError::Validation(format!(
            "Unsupported document type '{}'",
            file.content_type
        )));
    }

    let count = resumes.count_for_owner(owner_id).await?;
    if count >= MAX_RESUMES {
        return Err(AppError::Validation(format!(
            "Maximum number of stored resumes ({MAX_RESUMES}) reached. Please delete older versions first."
        )));
    }

    let version = resumes.max_version(owner_id).await? + 1;
    let file_key = object_key("resumes", &owner_id.to_string(), &file.file_name);

    storage
        .put(&file_key, file.bytes, &file.content_type)
        .await?;

    let now = Utc::now();
    let row = ResumeRow {
        id: Uuid::new_v4(),
        owner_id,
        file_name: file.file_name,
        file_key,
        status: ResumeStatus::Uploaded.as_str().to_string(),
        error_message: None,
        version,
        created_at: now,
        updated_at: now,
    };
    resumes.insert(&row).await?;

    info!(
        "Stored resume {} v{} for owner {} ({})",
        row.id, row.version, owner_id, row.file_key
    );
    Ok(row)
}

/// Flips the resume to PARSING and publishes exactly one parse job.
///
/// The status write and the publish are not transactional: when the publish
/// fails the row is explicitly rolled back to PARSE_ERROR so the client is
/// never told a job is in flight with no message on the queue.
pub async fn submit_parse_job(
    resumes: &dyn ResumeStore,
    queue: &dyn ParseQueue,
    owner_id: Uuid,
    resume_id: Uuid,
    callback_url: &str,
) -> Result<(), AppError> {
    let resume = resumes
        .find_owned(resume_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    match resume.status() {
        Some(ResumeStatus::Uploaded) | Some(ResumeStatus::ParseError) => {}
        Some(ResumeStatus::Parsing) => {
            return Err(AppError::Validation(
                "A parse job is already in progress for this resume".to_string(),
            ));
        }
        Some(ResumeStatus::Parsed) => {
            return Err(AppError::Validation(
                "This resume has already been parsed".to_string(),
            ));
        }
        None => {
            return Err(AppError::Internal(anyhow::anyhow!(
                "resume {resume_id} has unknown status '{}'",
                resume.status
            )));
        }
    }

    resumes
        .set_status(resume_id, ResumeStatus::Parsing, None)
        .await?;

    let job = ParseJob {
        resume_id: resume_id.to_string(),
        owner_id: owner_id.to_string(),
        storage_key: resume.file_key.clone(),
        callback_url: callback_url.to_string(),
        retries: 0,
    };

    if let Err(publish_err) = queue.publish(&job).await {
        error!("Parse job publish failed for resume {resume_id}, rolling back: {publish_err}");
        resumes
            .set_status(
                resume_id,
                ResumeStatus::ParseError,
                Some("Failed to enqueue parse job"),
            )
            .await?;
        return Err(publish_err);
    }

    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStatusResponse {
    pub status: String,
    pub parsed_data: Option<ParsedResumeData>,
    pub error: Option<String>,
}

/// Read path for polling clients. Ownership is checked before any data
/// read; parsed data is attached only in PARSED, the stored worker error
/// only in PARSE_ERROR. No side effects.
pub async fn read_parse_status(
    resumes: &dyn ResumeStore,
    documents: &dyn DocumentStore,
    owner_id: Uuid,
    resume_id: Uuid,
) -> Result<ParseStatusResponse, AppError> {
    let resume = resumes
        .find_owned(resume_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    let mut response = ParseStatusResponse {
        status: resume.status.clone(),
        parsed_data: None,
        error: None,
    };

    match resume.status() {
        Some(ResumeStatus::Parsed) => {
            response.parsed_data = documents
                .find(&resume_id.to_string())
                .await?
                .map(|doc| doc.data);
        }
        Some(ResumeStatus::ParseError) => {
            response.error = resume.error_message.clone();
        }
        _ => {}
    }

    Ok(response)
}

/// Explicit user delete: row, stored object, and parsed document all go.
pub async fn delete_resume(
    resumes: &dyn ResumeStore,
    documents: &dyn DocumentStore,
    storage: &dyn ObjectStore,
    owner_id: Uuid,
    resume_id: Uuid,
) -> Result<(), AppError> {
    let resume = resumes
        .find_owned(resume_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    storage.delete(&resume.file_key).await?;
    documents.delete(&resume_id.to_string()).await?;
    resumes.delete(resume_id).await?;

    info!("Deleted resume {resume_id} for owner {owner_id}");
    Ok(())
}
