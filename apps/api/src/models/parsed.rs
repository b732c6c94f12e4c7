//! Structured parse results produced by the external resume-parser worker.
//!
//! Every structural field is always present after `from_payload`: absent
//! fields deserialize to explicit empty defaults, never stay undefined.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Bumped whenever the parsed-data shape changes.
pub const PARSED_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub graduation_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedResumeData {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub raw_text: String,
}

impl ParsedResumeData {
    /// Converts a worker `parsedData` payload into the stored shape,
    /// filling absent structural fields with empty defaults. A payload the
    /// worker mangled beyond recognition degrades to an all-defaults
    /// document rather than failing the callback.
    pub fn from_payload(payload: Option<Value>) -> Self {
        match payload {
            None => ParsedResumeData::default(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Malformed parsedData payload, storing empty defaults: {e}");
                ParsedResumeData::default()
            }),
        }
    }
}

/// One document per resume, keyed by `resume_id` (uuid for permanent
/// resumes, storage key for trial uploads). Upsert semantics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResumeDocument {
    pub resume_id: String,
    pub owner_id: String,
    pub data: ParsedResumeData,
    pub confidence: f64,
    pub schema_version: i32,
    pub updated_at: DateTime<Utc>,
}
