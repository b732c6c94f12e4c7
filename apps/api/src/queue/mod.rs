//! Parse-job publishing over AMQP.
//!
//! The external resume-parser worker consumes the durable `resume_parsing`
//! queue and reports back over HTTP to the callback address carried in each
//! job. Publishing is fire-and-forget from the client's point of view: the
//! submit request blocks only until the broker confirms the publish.

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;

pub const PARSE_QUEUE: &str = "resume_parsing";

/// AMQP delivery-mode 2: broker persists the message to disk.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// The message handed to the external parser worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseJob {
    pub resume_id: String,
    pub owner_id: String,
    /// Object-storage key of the uploaded source file.
    pub storage_key: String,
    /// Where the worker POSTs its completion callback.
    pub callback_url: String,
    pub retries: u32,
}

#[async_trait]
pub trait ParseQueue: Send + Sync {
    /// Publishes exactly one job; returns once the broker confirms.
    async fn publish(&self, job: &ParseJob) -> Result<(), AppError>;
}

pub struct AmqpParseQueue {
    channel: Channel,
}

impl AmqpParseQueue {
    /// Connects, opens a channel, and declares the durable parse queue.
    /// Constructed once at startup and injected into `AppState`.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| AppError::Queue(format!("AMQP connect failed: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| AppError::Queue(format!("AMQP channel failed: {e}")))?;

        channel
            .queue_declare(
                PARSE_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AppError::Queue(format!("queue declare failed: {e}")))?;

        info!("AMQP channel ready, queue '{PARSE_QUEUE}' declared");
        Ok(Self { channel })
    }
}

#[async_trait]
impl ParseQueue for AmqpParseQueue {
    async fn publish(&self, job: &ParseJob) -> Result<(), AppError> {
        let payload = serde_json::to_vec(job)
            .map_err(|e| AppError::Queue(format!("job serialization failed: {e}")))?;

        self.channel
            .basic_publish(
                "",
                PARSE_QUEUE,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(DELIVERY_MODE_PERSISTENT),
            )
            .await
            .map_err(|e| AppError::Queue(format!("publish failed: {e}")))?
            .await
            .map_err(|e| AppError::Queue(format!("publish unconfirmed: {e}")))?;

        debug!(
            "Published parse job for resume {} (owner {})",
            job.resume_id, job.owner_id
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Test double: records published jobs, optionally failing every publish
    /// to exercise the submit rollback path.
    #[derive(Default)]
    pub struct RecordingQueue {
        pub published: Mutex<Vec<ParseJob>>,
        fail: AtomicBool,
    }

    impl RecordingQueue {
        pub fn failing() -> Self {
            let queue = RecordingQueue::default();
            queue.fail.store(true, Ordering::Relaxed);
            queue
        }

        pub fn jobs(&self) -> Vec<ParseJob> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ParseQueue for RecordingQueue {
        async fn publish(&self, job: &ParseJob) -> Result<(), AppError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(AppError::Queue("broker unavailable".to_string()));
            }
            self.published.lock().unwrap().push(job.clone());
            Ok(())
        }
    }
}
