use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Path to the externally-owned question catalog JSON. Optional: without
    /// it the catalog is empty and completion metrics stay at zero.
    pub question_catalog_path: Option<String>,
    pub fallback_cache_dir: String,
    pub upload_url_ttl_secs: u64,
    pub download_url_ttl_secs: u64,
    /// Question id whose answer serves as an employee's display name.
    pub display_name_question: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            question_catalog_path: std::env::var("QUESTION_CATALOG").ok(),
            fallback_cache_dir: std::env::var("FALLBACK_CACHE_DIR")
                .unwrap_or_else(|_| "fallback-cache".to_string()),
            upload_url_ttl_secs: std::env::var("UPLOAD_URL_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .context("UPLOAD_URL_TTL_SECS must be a number of seconds")?,
            download_url_ttl_secs: std::env::var("DOWNLOAD_URL_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse::<u64>()
                .context("DOWNLOAD_URL_TTL_SECS must be a number of seconds")?,
            display_name_question: std::env::var("DISPLAY_NAME_QUESTION")
                .unwrap_or_else(|_| "employeeName".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
