use std::sync::Arc;

use crate::config::Config;
use crate::documents::DocumentStore;
use crate::llm_client::LlmClient;
use crate::notifications::notifier::Notifier;
use crate::queue::ParseQueue;
use crate::resumes::store::{ResumeStore, TrialStore};
use crate::storage::ObjectStore;
use crate::trial::limiter::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external system sits behind a trait object so handlers can be
/// exercised against in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub resumes: Arc<dyn ResumeStore>,
    pub trials: Arc<dyn TrialStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn ParseQueue>,
    pub limiter: Arc<dyn RateLimiter>,
    pub notifier: Notifier,
    pub llm: LlmClient,
    pub config: Config,
}
