use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Application configuration loaded from environment variables once at startup.
/// Fails startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Upper bound for a single attempt against the generative backend.
    pub generation_timeout: Duration,
    pub port: u16,
    /// Prefix for document references handed back to clients.
    pub public_base_url: String,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Rendered documents older than this are evicted. `None` keeps them forever.
    pub output_ttl: Option<Duration>,
    pub max_upload_bytes: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port = parse_env("PORT", 5000u16)?;
        let ttl_secs = parse_env("OUTPUT_TTL_SECS", 86_400u64)?;

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: optional_env("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: optional_env("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            generation_timeout: Duration::from_secs(parse_env("GENERATION_TIMEOUT_SECS", 60u64)?),
            port,
            public_base_url: optional_env("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            upload_dir: optional_env("UPLOAD_DIR")
                .unwrap_or_else(|| "uploads".to_string())
                .into(),
            output_dir: optional_env("OUTPUT_DIR")
                .unwrap_or_else(|| "outputs".to_string())
                .into(),
            output_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Endpoint for a single `generateContent` call. The credential travels in a header.
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.gemini_base_url.trim_end_matches('/'),
            self.gemini_model
        )
    }

    /// Public reference for a file written to the output directory.
    pub fn output_url(&self, file_name: &str) -> String {
        format!("{}/outputs/{}", self.public_base_url, file_name)
    }

    /// Creates the upload and output directories if they are absent.
    pub async fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path, base_url: &str) -> Self {
        Config {
            gemini_api_key: "test-key".to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: base_url.to_string(),
            generation_timeout: Duration::from_secs(5),
            port: 5000,
            public_base_url: "http://localhost:5000".to_string(),
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
            output_ttl: None,
            max_upload_bytes: 1024 * 1024,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
