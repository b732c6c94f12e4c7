use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub amqp_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    /// Public base URL of this API, used to build the worker callback address.
    pub api_base_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            amqp_url: require_env("AMQP_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            api_base_url: require_env("API_BASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// The callback address handed to the external parser worker.
    pub fn parse_callback_url(&self) -> String {
        format!(
            "{}/api/v1/notifications/parse-complete",
            self.api_base_url.trim_end_matches('/')
        )
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
impl Config {
    /// A config literal for handler-level tests. Nothing in it is dialed.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/oomi_test".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            amqp_url: "amqp://127.0.0.1:5672".into(),
            s3_bucket: "oomi-test".into(),
            s3_endpoint: "http://127.0.0.1:9000".into(),
            aws_access_key_id: "test".into(),
            aws_secret_access_key: "test".into(),
            anthropic_api_key: "test".into(),
            api_base_url: "http://127.0.0.1:8080".into(),
            port: 8080,
            rust_log: "debug".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        let mut cfg = Config::for_tests();
        cfg.api_base_url = "http://api.example.com/".into();
        assert_eq!(
            cfg.parse_callback_url(),
            "http://api.example.com/api/v1/notifications/parse-complete"
        );
    }
}
