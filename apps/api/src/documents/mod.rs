//! Parsed-resume document store.
//!
//! One row per resume, JSONB payload, upsert-by-resume_id semantics. The
//! relational resume status is authoritative; this store is a derived
//! enrichment and its writes are deliberately separate, sequential and
//! non-transactional with the status update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::errors::AppError;
use crate::models::parsed::{ParsedResumeData, ParsedResumeDocument};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts or overwrites the document for `doc.resume_id`. A redelivered
    /// completion callback must land on the same row, never a duplicate.
    async fn upsert(&self, doc: &ParsedResumeDocument) -> Result<(), AppError>;

    async fn find(&self, resume_id: &str) -> Result<Option<ParsedResumeDocument>, AppError>;

    async fn delete(&self, resume_id: &str) -> Result<(), AppError>;
}

#[derive(Debug, FromRow)]
struct ParsedResumeRow {
    resume_id: String,
    owner_id: String,
    data: serde_json::Value,
    confidence: f64,
    schema_version: i32,
    updated_at: DateTime<Utc>,
}

impl ParsedResumeRow {
    fn into_document(self) -> ParsedResumeDocument {
        ParsedResumeDocument {
            resume_id: self.resume_id,
            owner_id: self.owner_id,
            data: ParsedResumeData::from_payload(Some(self.data)),
            confidence: self.confidence,
            schema_version: self.schema_version,
            updated_at: self.updated_at,
        }
    }
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn upsert(&self, doc: &ParsedResumeDocument) -> Result<(), AppError> {
        let data = serde_json::to_value(&doc.data)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("document serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO parsed_resumes
                (resume_id, owner_id, data, confidence, schema_version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (resume_id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                data = EXCLUDED.data,
                confidence = EXCLUDED.confidence,
                schema_version = EXCLUDED.schema_version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&doc.resume_id)
        .bind(&doc.owner_id)
        .bind(&data)
        .bind(doc.confidence)
        .bind(doc.schema_version)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, resume_id: &str) -> Result<Option<ParsedResumeDocument>, AppError> {
        let row: Option<ParsedResumeRow> =
            sqlx::query_as("SELECT * FROM parsed_resumes WHERE resume_id = $1")
                .bind(resume_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ParsedResumeRow::into_document))
    }

    async fn delete(&self, resume_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM parsed_resumes WHERE resume_id = $1")
            .bind(resume_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryDocumentStore {
        docs: Mutex<HashMap<String, ParsedResumeDocument>>,
    }

    impl InMemoryDocumentStore {
        pub fn len(&self) -> usize {
            self.docs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DocumentStore for InMemoryDocumentStore {
        async fn upsert(&self, doc: &ParsedResumeDocument) -> Result<(), AppError> {
            self.docs
                .lock()
                .unwrap()
                .insert(doc.resume_id.clone(), doc.clone());
            Ok(())
        }

        async fn find(&self, resume_id: &str) -> Result<Option<ParsedResumeDocument>, AppError> {
            Ok(self.docs.lock().unwrap().get(resume_id).cloned())
        }

        async fn delete(&self, resume_id: &str) -> Result<(), AppError> {
            self.docs.lock().unwrap().remove(resume_id);
            Ok(())
        }
    }

    /// Fails every write; used to verify that a document-store failure never
    /// undoes or fails the authoritative status update.
    #[derive(Default)]
    pub struct FailingDocumentStore;

    #[async_trait]
    impl DocumentStore for FailingDocumentStore {
        async fn upsert(&self, _doc: &ParsedResumeDocument) -> Result<(), AppError> {
            Err(AppError::Internal(anyhow::anyhow!("document store down")))
        }

        async fn find(&self, _resume_id: &str) -> Result<Option<ParsedResumeDocument>, AppError> {
            Ok(None)
        }

        async fn delete(&self, _resume_id: &str) -> Result<(), AppError> {
            Err(AppError::Internal(anyhow::anyhow!("document store down")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryDocumentStore;
    use super::*;
    use crate::models::parsed::PARSED_SCHEMA_VERSION;

    fn doc(resume_id: &str, skills: &[&str]) -> ParsedResumeDocument {
        ParsedResumeDocument {
            resume_id: resume_id.to_string(),
            owner_id: "u1".to_string(),
            data: ParsedResumeData {
                skills: skills.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            confidence: 0.9,
            schema_version: PARSED_SCHEMA_VERSION,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryDocumentStore::default();
        store.upsert(&doc("r1", &["Go"])).await.unwrap();
        store.upsert(&doc("r1", &["Go"])).await.unwrap();

        assert_eq!(store.len(), 1);
        let found = store.find("r1").await.unwrap().unwrap();
        assert_eq!(found.data.skills, vec!["Go"]);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_last_write_wins() {
        let store = InMemoryDocumentStore::default();
        store.upsert(&doc("r1", &["Go"])).await.unwrap();
        store.upsert(&doc("r1", &["Rust"])).await.unwrap();

        let found = store.find("r1").await.unwrap().unwrap();
        assert_eq!(found.data.skills, vec!["Rust"]);
    }
}
