//! Résumé optimization pipeline. Sequences one request end to end.
//!
//! Flow: extract → prompt → generate → parse → normalize → render.
//!
//! Each stage completes before the next begins. The upload is deleted as soon
//! as extraction finishes, whatever its outcome. A failure at any stage aborts
//! the rest, and no rendered document survives a failed run.

use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::extraction::{self, ExtractionError, UploadedDocument};
use crate::generation::{self, GenerationRequest, ParseError};
use crate::llm_client::{GenerationBackend, GenerationError};
use crate::render::{self, RenderError, RenderedDocument};

pub const RESUME_TITLE: &str = "Optimized Resume";
pub const COVER_LETTER_TITLE: &str = "Cover Letter";

const RESUME_FILE_PREFIX: &str = "Optimized_Resume";
const COVER_LETTER_FILE_PREFIX: &str = "Cover_Letter";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure kinds surfaced at the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Extraction,
    GenerationUnavailable,
    InvalidGenerationFormat,
    Render,
    Internal,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not read the uploaded resume: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Generative backend is unavailable or returned an error: {0}")]
    GenerationUnavailable(GenerationError),

    #[error("Generative backend returned an invalid reply: {source}")]
    InvalidGenerationFormat {
        #[source]
        source: ParseError,
        raw: String,
    },

    #[error("Failed to render output document: {0}")]
    Render(#[from] RenderError),

    /// Catch-all for failures outside the stage taxonomy, such as storing the upload.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GenerationError> for PipelineError {
    /// A 2xx reply that does not decode is a format problem, not an outage.
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Envelope { reason, body } => PipelineError::InvalidGenerationFormat {
                source: ParseError::Envelope(reason),
                raw: body,
            },
            other => PipelineError::GenerationUnavailable(other),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Extraction(_) => FailureKind::Extraction,
            PipelineError::GenerationUnavailable(_) => FailureKind::GenerationUnavailable,
            PipelineError::InvalidGenerationFormat { .. } => FailureKind::InvalidGenerationFormat,
            PipelineError::Render(_) => FailureKind::Render,
            PipelineError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Diagnostic payload for the caller: upstream status/body or the raw reply text.
    pub fn details(&self) -> Option<Value> {
        match self {
            PipelineError::GenerationUnavailable(e) => Some(e.details()),
            PipelineError::InvalidGenerationFormat { source, raw } => Some(json!({
                "reason": source.to_string(),
                "raw": raw,
            })),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage tracking
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracting,
    Prompting,
    Generating,
    Parsing,
    Normalizing,
    Rendering,
    Completed,
    Failed(FailureKind),
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed(_))
    }
}

/// Records and logs stage transitions for one request.
#[derive(Debug)]
struct StageTracker {
    request_id: Uuid,
    stage: Stage,
}

impl StageTracker {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(!self.stage.is_terminal(), "advance from terminal stage");
        debug!(request_id = %self.request_id, from = ?self.stage, to = ?next, "Pipeline stage");
        self.stage = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        let kind = err.kind();
        error!(
            request_id = %self.request_id,
            stage = ?self.stage,
            ?kind,
            details = ?err.details(),
            "Pipeline failed: {err}"
        );
        self.stage = Stage::Failed(kind);
        err
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Successful result: both normalized fields and both rendered documents.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub request_id: Uuid,
    pub optimized_resume: String,
    pub cover_letter: String,
    pub resume_document: RenderedDocument,
    pub cover_letter_document: RenderedDocument,
}

pub struct Pipeline<'a> {
    backend: &'a dyn GenerationBackend,
    output_dir: &'a Path,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: &'a dyn GenerationBackend, output_dir: &'a Path) -> Self {
        Self {
            backend,
            output_dir,
        }
    }

    /// Runs one request. Takes ownership of the upload and always deletes it.
    pub async fn run(
        &self,
        upload: UploadedDocument,
        job_description: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        let request_id = Uuid::new_v4();
        let mut tracker = StageTracker::new(request_id);
        info!(%request_id, format = ?upload.format(), "Optimization request received");

        match self.execute(&mut tracker, upload, job_description).await {
            Ok(output) => {
                tracker.advance(Stage::Completed);
                info!(%request_id, "Optimization request completed");
                Ok(output)
            }
            Err(e) => Err(tracker.fail(e)),
        }
    }

    async fn execute(
        &self,
        tracker: &mut StageTracker,
        upload: UploadedDocument,
        job_description: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        tracker.advance(Stage::Extracting);
        let extracted = extraction::extract_text(upload.storage_path(), upload.format()).await;
        if let Err(e) = upload.discard() {
            warn!(request_id = %tracker.request_id, "Failed to delete temporary upload: {e}");
        }
        let resume_text = extracted?;

        tracker.advance(Stage::Prompting);
        let request = GenerationRequest::new(&resume_text, job_description);
        let prompt = request.build_prompt();
        debug!(
            request_id = %tracker.request_id,
            resume_chars = request.resume_text().chars().count(),
            prompt_chars = prompt.chars().count(),
            "Prompt built"
        );

        tracker.advance(Stage::Generating);
        let raw = self.backend.generate(&prompt).await?;

        tracker.advance(Stage::Parsing);
        let reply = generation::parse_reply(&raw)
            .map_err(|source| PipelineError::InvalidGenerationFormat { source, raw })?;

        tracker.advance(Stage::Normalizing);
        let optimized_resume = generation::normalize(&reply.optimized_resume);
        let cover_letter = generation::normalize(&reply.cover_letter);

        tracker.advance(Stage::Rendering);
        let suffix = request_suffix(tracker.request_id);
        let resume_path = self
            .output_dir
            .join(output_file_name(RESUME_FILE_PREFIX, &suffix));
        let cover_path = self
            .output_dir
            .join(output_file_name(COVER_LETTER_FILE_PREFIX, &suffix));

        let resume_document = render::render_pdf(&optimized_resume, &resume_path, RESUME_TITLE).await?;
        let cover_letter_document =
            match render::render_pdf(&cover_letter, &cover_path, COVER_LETTER_TITLE).await {
                Ok(doc) => doc,
                Err(e) => {
                    // a half-finished pair is never referenced; drop the first document
                    if let Err(cleanup) = tokio::fs::remove_file(&resume_document.file_path).await {
                        warn!("Failed to remove orphaned document: {cleanup}");
                    }
                    return Err(e.into());
                }
            };

        Ok(PipelineOutput {
            request_id: tracker.request_id,
            optimized_resume,
            cover_letter,
            resume_document,
            cover_letter_document,
        })
    }
}

/// Short request-scoped tag shared by both documents of one request.
fn request_suffix(request_id: Uuid) -> String {
    request_id.simple().to_string()[..8].to_string()
}

/// `<Prefix>_<unix-millis>_<suffix>.pdf`
fn output_file_name(prefix: &str, suffix: &str) -> String {
    format!("{prefix}_{}_{suffix}.pdf", Utc::now().timestamp_millis())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
