use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Resume lifecycle states. Stored as TEXT; transitions are monotonic
/// forward except `ParseError -> Parsing` on a client-initiated retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeStatus {
    Uploaded,
    Parsing,
    Parsed,
    ParseError,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::Uploaded => "UPLOADED",
            ResumeStatus::Parsing => "PARSING",
            ResumeStatus::Parsed => "PARSED",
            ResumeStatus::ParseError => "PARSE_ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPLOADED" => Some(ResumeStatus::Uploaded),
            "PARSING" => Some(ResumeStatus::Parsing),
            "PARSED" => Some(ResumeStatus::Parsed),
            "PARSE_ERROR" => Some(ResumeStatus::ParseError),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    /// Object-storage key of the uploaded source file.
    pub file_key: String,
    pub status: String,
    pub error_message: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    pub fn status(&self) -> Option<ResumeStatus> {
        ResumeStatus::parse(&self.status)
    }
}

/// Lifetime of an anonymous trial session.
pub const TRIAL_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrialSessionRow {
    pub id: Uuid,
    pub ip_address: String,
    /// Storage key of the trial upload. Trial resumes have no `ResumeRow`;
    /// this key doubles as the document-store identifier.
    pub resume_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TrialSessionRow {
    pub fn new(ip_address: &str) -> Self {
        let now = Utc::now();
        TrialSessionRow {
            id: Uuid::new_v4(),
            ip_address: ip_address.to_string(),
            resume_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(TRIAL_SESSION_TTL_HOURS),
        }
    }

    /// Expiry is enforced on use, not by a cleanup sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            ResumeStatus::Uploaded,
            ResumeStatus::Parsing,
            ResumeStatus::Parsed,
            ResumeStatus::ParseError,
        ] {
            assert_eq!(ResumeStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_status_rejects_unknown() {
        assert_eq!(ResumeStatus::parse("VERIFIED"), None);
    }

    #[test]
    fn test_trial_session_expiry_on_use() {
        let session = TrialSessionRow::new("203.0.113.9");
        assert!(!session.is_expired(Utc::now()));
        assert!(session.is_expired(Utc::now() + Duration::hours(TRIAL_SESSION_TTL_HOURS + 1)));
    }
}
