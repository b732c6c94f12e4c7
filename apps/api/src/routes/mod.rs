pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::notifications;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::trial::handlers as trial;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list).post(resumes::handle_upload),
        )
        .route("/api/v1/resumes/:id", delete(resumes::handle_delete))
        .route("/api/v1/resumes/:id/download", get(resumes::handle_download))
        .route("/api/v1/resumes/:id/parse", post(resumes::handle_submit_parse))
        .route(
            "/api/v1/resumes/:id/parse-status",
            get(resumes::handle_parse_status),
        )
        // Worker callback + live parse events
        .route(
            "/api/v1/notifications/parse-complete",
            post(notifications::handlers::handle_parse_complete),
        )
        .route(
            "/api/v1/notifications/stream",
            get(notifications::notifier::handle_stream),
        )
        // Trial API (anonymous, session-scoped)
        .route("/api/v1/trial/start", post(trial::handle_start_trial))
        .route("/api/v1/trial/resume", post(trial::handle_trial_upload))
        .route("/api/v1/trial/generate", post(trial::handle_generate))
        .route("/api/v1/trial/parse-status", get(trial::handle_parse_status))
        .with_state(state)
}
