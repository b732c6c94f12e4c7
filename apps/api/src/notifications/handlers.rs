//! Completion Receiver — the callback endpoint the external parser worker
//! POSTs to when a parse job finishes.
//!
//! Ordering and failure isolation:
//! 1. branch trial vs permanent on the resume identifier
//! 2. authoritative relational status write (must succeed)
//! 3. parsed-document upsert (logged and swallowed on failure)
//! 4. owner-scoped live notification (best-effort)
//! 5. 200 to the worker once step 2 committed
//!
//! The transport may redeliver, so steps 2 and 3 are idempotent writes.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::documents::DocumentStore;
use crate::errors::AppError;
use crate::models::parsed::{ParsedResumeData, ParsedResumeDocument, PARSED_SCHEMA_VERSION};
use crate::models::resume::ResumeStatus;
use crate::notifications::notifier::{Notifier, ParseNotification};
use crate::resumes::store::{ResumeStore, TrialStore};
use crate::state::AppState;
use crate::storage::TRIAL_KEY_PREFIX;

pub const STATUS_COMPLETED: &str = "completed";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseCompletePayload {
    pub resume_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    /// "completed" | "error" (anything else is treated as an error report).
    pub status: String,
    #[serde(default)]
    pub parsed_data: Option<Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ParseCompletePayload {
    fn completed_at(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

/// POST /api/v1/notifications/parse-complete
pub async fn handle_parse_complete(
    State(state): State<AppState>,
    Json(payload): Json<ParseCompletePayload>,
) -> Result<Json<Value>, AppError> {
    apply_completion(
        state.resumes.as_ref(),
        state.trials.as_ref(),
        state.documents.as_ref(),
        &state.notifier,
        payload,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

/// Applies one completion callback. See the module docs for the step
/// ordering contract.
pub async fn apply_completion(
    resumes: &dyn ResumeStore,
    trials: &dyn TrialStore,
    documents: &dyn DocumentStore,
    notifier: &Notifier,
    payload: ParseCompletePayload,
) -> Result<(), AppError> {
    let succeeded = payload.status == STATUS_COMPLETED;

    // Step 1+2: branch, then write the authoritative status.
    let owner_key = if payload.resume_id.starts_with(TRIAL_KEY_PREFIX) {
        // Trial uploads have no ResumeRow; the session is looked up by the
        // storage key. A missing session (expired and cleaned up between
        // submit and callback) is absorbed, not an error to the worker.
        match trials.find_by_resume_key(&payload.resume_id).await? {
            Some(session) => session.id.to_string(),
            None => {
                warn!(
                    "Completion for unknown trial resume '{}', dropping",
                    payload.resume_id
                );
                return Ok(());
            }
        }
    } else {
        let resume_id = Uuid::parse_str(&payload.resume_id).map_err(|_| {
            AppError::Validation(format!("Invalid resume id '{}'", payload.resume_id))
        })?;
        let status = if succeeded {
            ResumeStatus::Parsed
        } else {
            ResumeStatus::ParseError
        };
        let row = resumes
            .set_status(resume_id, status, payload.error.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

        info!(
            "Resume {} -> {} (owner {})",
            resume_id,
            status.as_str(),
            row.owner_id
        );
        row.owner_id.to_string()
    };

    // Step 3: derived document upsert. The status update above already
    // committed, so a failure here must not fail the callback.
    if succeeded {
        let document = ParsedResumeDocument {
            resume_id: payload.resume_id.clone(),
            owner_id: owner_key.clone(),
            data: ParsedResumeData::from_payload(payload.parsed_data.clone()),
            confidence: payload.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            schema_version: PARSED_SCHEMA_VERSION,
            updated_at: payload.completed_at(),
        };
        if let Err(e) = documents.upsert(&document).await {
            error!(
                "Parsed-document upsert failed for {} (status already committed): {e}",
                payload.resume_id
            );
        }
    }

    // Step 4: best-effort live notification to the owner's clients.
    notifier.notify(ParseNotification {
        owner_id: owner_key,
        resume_id: payload.resume_id,
        status: payload.status,
        error: payload.error,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::memory::{FailingDocumentStore, InMemoryDocumentStore};
    use crate::models::resume::TrialSessionRow;
    use crate::queue::recording::RecordingQueue;
    use crate::resumes::store::memory::InMemoryStore;
    use crate::resumes::submit::{submit_parse_job, upload_resume, UploadedFile};
    use crate::storage::memory::InMemoryStorage;

    fn completed(resume_id: &str, parsed: Value) -> ParseCompletePayload {
        ParseCompletePayload {
            resume_id: resume_id.to_string(),
            owner_id: None,
            status: "completed".to_string(),
            parsed_data: Some(parsed),
            confidence: Some(0.92),
            error: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    fn failed(resume_id: &str, message: &str) -> ParseCompletePayload {
        ParseCompletePayload {
            resume_id: resume_id.to_string(),
            owner_id: None,
            status: "error".to_string(),
            parsed_data: None,
            confidence: None,
            error: Some(message.to_string()),
            timestamp: None,
        }
    }

    async fn submitted_resume(
        store: &InMemoryStore,
        storage: &InMemoryStorage,
        owner: Uuid,
    ) -> Uuid {
        let row = upload_resume(
            store,
            storage,
            owner,
            UploadedFile {
                file_name: "cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.4".to_vec(),
            },
        )
        .await
        .unwrap();
        submit_parse_job(
            store,
            &RecordingQueue::default(),
            owner,
            row.id,
            "http://api/cb",
        )
        .await
        .unwrap();
        row.id
    }

    #[tokio::test]
    async fn test_submit_then_complete_then_read_round_trip() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);
        let owner = Uuid::new_v4();

        let id = submitted_resume(&store, &storage, owner).await;
        assert_eq!(store.resume(id).unwrap().status, "PARSING");

        apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            completed(&id.to_string(), json!({"skills": ["Go"]})),
        )
        .await
        .unwrap();

        let status =
            crate::resumes::submit::read_parse_status(&store, &documents, owner, id)
                .await
                .unwrap();
        assert_eq!(status.status, "PARSED");
        assert_eq!(status.parsed_data.unwrap().skills, vec!["Go"]);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);
        let owner = Uuid::new_v4();

        let id = submitted_resume(&store, &storage, owner).await;
        let payload = completed(&id.to_string(), json!({"skills": ["Go"]}));

        apply_completion(&store, &store, &documents, &notifier, payload.clone())
            .await
            .unwrap();
        apply_completion(&store, &store, &documents, &notifier, payload)
            .await
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(store.resume(id).unwrap().status, "PARSED");
    }

    #[tokio::test]
    async fn test_status_commits_even_when_document_store_fails() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let documents = FailingDocumentStore;
        let notifier = Notifier::new(16);
        let owner = Uuid::new_v4();

        let id = submitted_resume(&store, &storage, owner).await;

        // The callback still succeeds: the authoritative write committed.
        apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            completed(&id.to_string(), json!({})),
        )
        .await
        .unwrap();

        assert_eq!(store.resume(id).unwrap().status, "PARSED");
    }

    #[tokio::test]
    async fn test_error_completion_records_message_verbatim() {
        let store = InMemoryStore::default();
        let storage = InMemoryStorage::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);
        let owner = Uuid::new_v4();

        let id = submitted_resume(&store, &storage, owner).await;
        let mut rx = notifier.subscribe();

        apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            failed(&id.to_string(), "corrupt pdf"),
        )
        .await
        .unwrap();

        let row = store.resume(id).unwrap();
        assert_eq!(row.status, "PARSE_ERROR");
        assert_eq!(row.error_message.as_deref(), Some("corrupt pdf"));
        assert_eq!(documents.len(), 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, "error");
        assert_eq!(event.error.as_deref(), Some("corrupt pdf"));
        assert_eq!(event.owner_id, owner.to_string());
    }

    #[tokio::test]
    async fn test_completion_for_unknown_permanent_resume_is_not_found() {
        let store = InMemoryStore::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);

        let err = apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            failed(&Uuid::new_v4().to_string(), "corrupt pdf"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(documents.len(), 0);
    }

    #[tokio::test]
    async fn test_completion_with_garbage_resume_id_is_rejected_gracefully() {
        let store = InMemoryStore::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);

        let err = apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            failed("r2", "corrupt pdf"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_trial_completion_upserts_under_storage_key() {
        let store = InMemoryStore::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);

        let session = TrialSessionRow::new("203.0.113.9");
        store.create_session(&session).await.unwrap();
        let key = format!("trial/{}/1-cv.pdf", session.id);
        store.attach_resume(session.id, &key).await.unwrap();

        let mut rx = notifier.subscribe();
        apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            completed(&key, json!({"skills": ["Go"]})),
        )
        .await
        .unwrap();

        let doc = documents.find(&key).await.unwrap().unwrap();
        assert_eq!(doc.owner_id, session.id.to_string());
        assert_eq!(doc.data.skills, vec!["Go"]);
        assert_eq!(rx.recv().await.unwrap().owner_id, session.id.to_string());
    }

    #[tokio::test]
    async fn test_trial_completion_without_session_is_absorbed() {
        let store = InMemoryStore::default();
        let documents = InMemoryDocumentStore::default();
        let notifier = Notifier::new(16);

        apply_completion(
            &store,
            &store,
            &documents,
            &notifier,
            completed("trial/nobody/1-cv.pdf", json!({})),
        )
        .await
        .unwrap();

        assert_eq!(documents.len(), 0);
    }
}
