//! Relational store seams for resumes and trial sessions.
//!
//! Production impl is `PgStore` over the sqlx pool; tests run against the
//! in-memory impl in `memory`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeRow, ResumeStatus, TrialSessionRow};

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn insert(&self, row: &ResumeRow) -> Result<(), AppError>;

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ResumeRow>, AppError>;

    /// Ownership-scoped lookup: a resume belonging to another owner is
    /// indistinguishable from a missing one.
    async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> Result<Option<ResumeRow>, AppError>;

    async fn count_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError>;

    async fn max_version(&self, owner_id: Uuid) -> Result<i32, AppError>;

    /// Writes the status (and error message) for a resume, returning the
    /// updated row, or `None` when no such resume exists. Idempotent.
    async fn set_status(
        &self,
        id: Uuid,
        status: ResumeStatus,
        error: Option<&str>,
    ) -> Result<Option<ResumeRow>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait TrialStore: Send + Sync {
    async fn create_session(&self, session: &TrialSessionRow) -> Result<(), AppError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<TrialSessionRow>, AppError>;

    /// Records the storage key of the trial upload on the session.
    async fn attach_resume(&self, id: Uuid, resume_key: &str) -> Result<(), AppError>;

    /// Reverse lookup used by the completion receiver's trial branch.
    async fn find_by_resume_key(&self, key: &str) -> Result<Option<TrialSessionRow>, AppError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgStore {
    async fn insert(&self, row: &ResumeRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO resumes
                (id, owner_id, file_name, file_key, status, error_message,
                 version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(row.id)
        .bind(row.owner_id)
        .bind(&row.file_name)
        .bind(&row.file_key)
        .bind(&row.status)
        .bind(&row.error_message)
        .bind(row.version)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
        Ok(sqlx::query_as(
            "SELECT * FROM resumes WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_owned(&self, id: Uuid, owner_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(
            sqlx::query_as("SELECT * FROM resumes WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn count_for_owner(&self, owner_id: Uuid) -> Result<i64, AppError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM resumes WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn max_version(&self, owner_id: Uuid) -> Result<i32, AppError> {
        let max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(version) FROM resumes WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max.unwrap_or(0))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ResumeStatus,
        error: Option<&str>,
    ) -> Result<Option<ResumeRow>, AppError> {
        Ok(sqlx::query_as(
            r#"
            UPDATE resumes
            SET status = $2, error_message = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TrialStore for PgStore {
    async fn create_session(&self, session: &TrialSessionRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO trial_sessions
                (id, ip_address, resume_id, created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id)
        .bind(&session.ip_address)
        .bind(&session.resume_id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<TrialSessionRow>, AppError> {
        Ok(sqlx::query_as("SELECT * FROM trial_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn attach_resume(&self, id: Uuid, resume_key: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE trial_sessions SET resume_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(resume_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_resume_key(&self, key: &str) -> Result<Option<TrialSessionRow>, AppError> {
        Ok(
            sqlx::query_as("SELECT * FROM trial_sessions WHERE resume_id = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
