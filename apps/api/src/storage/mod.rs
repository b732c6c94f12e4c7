//! Object storage — uploaded source files live in S3/MinIO under
//! deterministic owner-scoped keys. The trait seam exists so handler logic
//! can be exercised against an in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use tracing::info;

use crate::errors::AppError;

/// Presigned download links expire after one hour.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Key prefix that marks a trial upload. The completion receiver branches
/// on it to tell trial resumes from permanent ones.
pub const TRIAL_KEY_PREFIX: &str = "trial/";

/// Builds the storage key for an upload: `{prefix}/{scope}/{millis}-{name}`.
/// Scope is the owner id (permanent) or the trial session id.
pub fn object_key(prefix: &str, scope: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        prefix,
        scope,
        Utc::now().timestamp_millis(),
        file_name
    )
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// Returns a time-limited GET URL for the object.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError>;
}

#[derive(Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("put {key} failed: {e}")))?;

        info!("Stored object s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("delete {key} failed: {e}")))?;
        Ok(())
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::S3(format!("presigning config: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| AppError::S3(format!("presign {key} failed: {e}")))?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Test double: objects in a HashMap, presigned URLs are `memory://` keys.
    #[derive(Default)]
    pub struct InMemoryStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryStorage {
        pub fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }

        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryStorage {
        async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn presigned_get_url(
            &self,
            key: &str,
            _expires_in: Duration,
        ) -> Result<String, AppError> {
            Ok(format!("memory://{key}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_shape() {
        let key = object_key("resumes", "u1", "cv.pdf");
        assert!(key.starts_with("resumes/u1/"));
        assert!(key.ends_with("-cv.pdf"));
    }

    #[test]
    fn test_trial_prefix_detection() {
        let key = object_key("trial", "s1", "cv.pdf");
        assert!(key.starts_with(TRIAL_KEY_PREFIX));
        assert!(!object_key("resumes", "u1", "cv.pdf").starts_with(TRIAL_KEY_PREFIX));
    }
}
