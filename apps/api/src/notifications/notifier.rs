//! Live Notifier — completion events pushed to connected clients over SSE.
//!
//! A lossy broadcast channel carried in `AppState`; delivery is scoped to
//! the owning client by filtering on the subscriber side, so one owner's
//! completion never reaches another owner's stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::debug;

use crate::auth::Owner;
use crate::state::AppState;

/// Wire shape pushed to clients: `{resumeId, status, error?}`. The owner id
/// routes the event and is not serialized.
#[derive(Debug, Clone, Serialize)]
pub struct ParseNotification {
    #[serde(skip)]
    pub owner_id: String,
    #[serde(rename = "resumeId")]
    pub resume_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fan-out handle. Sending is best-effort: no subscribers is not an error,
/// and a slow subscriber is lagged rather than backpressuring the
/// completion receiver.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<ParseNotification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn notify(&self, notification: ParseNotification) {
        if self.tx.send(notification).is_err() {
            debug!("No live subscribers for parse notification");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParseNotification> {
        self.tx.subscribe()
    }
}

/// GET /api/v1/notifications/stream
///
/// SSE stream of the caller's own completion events.
pub async fn handle_stream(
    State(state): State<AppState>,
    owner: Owner,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let owner_key = owner.0.to_string();
    let rx = state.notifier.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(n) if n.owner_id == owner_key => {
            let data = serde_json::to_string(&n).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(Event::default().event("resumeParseComplete").data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
