/// Generation client: the single point of entry for generative backend calls.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// The pipeline depends on `GenerationBackend`, never on `GeminiClient`.
///
/// Retry policy: one retry on a transient transport failure (connect error or
/// timeout). HTTP error statuses are surfaced immediately and never retried.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

#[cfg(test)]
pub mod stub;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_TRANSPORT_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response envelope: {reason}")]
    Envelope { reason: String, body: String },
}

impl GenerationError {
    /// Upstream HTTP status, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Http(e) => e.status().map(|s| s.as_u16()),
            GenerationError::Api { status, .. } => Some(*status),
            GenerationError::Envelope { .. } => None,
        }
    }

    /// Diagnostic payload for error responses. JSON bodies are passed through as JSON.
    pub fn details(&self) -> Value {
        let body = match self {
            GenerationError::Http(e) => return json!({ "message": e.to_string() }),
            GenerationError::Api { body, .. } | GenerationError::Envelope { body, .. } => body,
        };
        let body = serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.clone()));
        json!({ "status": self.status(), "body": body })
    }
}

/// A generative backend that turns one prompt into raw reply text.
///
/// Carried in `AppState` as `Arc<dyn GenerationBackend>`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyPart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; empty if there is none.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::builder().timeout(config.generation_timeout).build()?,
            endpoint: config.generate_content_url(),
            api_key: config.gemini_api_key.clone(),
        })
    }

    async fn call(&self, prompt: &str) -> Result<GenerateContentResponse, GenerationError> {
        let request_body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let mut attempt = 0;
        let response = loop {
            let sent = self
                .client
                .post(&self.endpoint)
                .header(API_KEY_HEADER, &self.api_key)
                .json(&request_body)
                .send()
                .await;

            match sent {
                Ok(response) => break response,
                Err(e) if is_transient(&e) && attempt < MAX_TRANSPORT_RETRIES => {
                    attempt += 1;
                    warn!(
                        "Generation request failed ({e}), retrying after {}ms",
                        RETRY_DELAY.as_millis()
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(GenerationError::Http(e)),
            }
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Generation API returned {}: {}", status, body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| GenerationError::Envelope {
                reason: e.to_string(),
                body,
            })?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Generation call succeeded: prompt_tokens={}, candidate_tokens={}",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(parsed)
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(self.call(prompt).await?.text())
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}
