use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::extraction::UploadedDocument;
use crate::pipeline::{Pipeline, PipelineError};
use crate::state::AppState;

const RESUME_FIELD: &str = "resume";
const JOB_DESCRIPTION_FIELD: &str = "jobDescription";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub optimized_resume: String,
    pub cover_letter: String,
    /// Public reference to the rendered résumé PDF.
    pub resume_pdf: String,
    /// Public reference to the rendered cover letter PDF.
    pub cover_letter_pdf: String,
}

/// POST /api/optimize
///
/// Multipart body: file field `resume`, text field `jobDescription`.
pub async fn handle_optimize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OptimizeResponse>, AppError> {
    let mut upload: Option<UploadedDocument> = None;
    let mut job_description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            RESUME_FIELD => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "resume.txt".to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                if data.is_empty() {
                    return Err(AppError::Validation("Uploaded resume file is empty".into()));
                }
                tracing::debug!("Received resume '{}' ({} bytes)", file_name, data.len());

                let stored = UploadedDocument::store(&state.config.upload_dir, &file_name, data)
                    .await
                    .context("Failed to store uploaded resume")
                    .map_err(PipelineError::Internal)?;
                upload = Some(stored);
            }
            JOB_DESCRIPTION_FIELD => {
                job_description = Some(field.text().await.map_err(multipart_error)?);
            }
            other => tracing::debug!("Ignoring multipart field '{other}'"),
        }
    }

    let upload = upload.ok_or_else(|| {
        AppError::Validation(format!("No resume provided. Use file field '{RESUME_FIELD}'"))
    })?;
    let job_description = job_description
        .filter(|jd| !jd.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Job description is required".into()))?;

    let output = Pipeline::new(state.backend.as_ref(), &state.config.output_dir)
        .run(upload, &job_description)
        .await?;
    tracing::debug!(
        request_id = %output.request_id,
        "Returning {} and {}",
        output.resume_document.title,
        output.cover_letter_document.title
    );

    Ok(Json(OptimizeResponse {
        resume_pdf: state.config.output_url(output.resume_document.file_name()),
        cover_letter_pdf: state.config.output_url(output.cover_letter_document.file_name()),
        optimized_resume: output.optimized_resume,
        cover_letter: output.cover_letter,
    }))
}

fn multipart_error(e: MultipartError) -> AppError {
    tracing::warn!("Failed to read multipart body: {e}");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::llm_client::stub::StubBackend;
    use crate::llm_client::GenerationBackend;
    use crate::routes::build_router;
    use crate::state::AppState;

    use super::*;

    const BOUNDARY: &str = "X-RESUME-TEST-BOUNDARY";
    const REPLY: &str = "```json\n{\"optimizedResume\":\"**John Doe** - Backend Engineer\",\"coverLetter\":\"- Dear Hiring Manager\"}\n```";

    enum Part<'a> {
        File(&'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    struct Harness {
        _root: tempfile::TempDir,
        config: Config,
        backend: Arc<StubBackend>,
    }

    impl Harness {
        async fn new(backend: StubBackend) -> Self {
            let root = tempfile::tempdir().unwrap();
            let config = Config::for_tests(root.path(), "http://unused");
            config.ensure_directories().await.unwrap();
            Self {
                _root: root,
                config,
                backend: Arc::new(backend),
            }
        }

        fn router(&self) -> Router {
            let backend: Arc<dyn GenerationBackend> = self.backend.clone();
            build_router(AppState {
                config: self.config.clone(),
                backend,
            })
        }

        async fn post(&self, parts: &[Part<'_>]) -> (StatusCode, Value) {
            let request = Request::builder()
                .method("POST")
                .uri("/api/optimize")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap();
            let response = self.router().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        fn count(&self, dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir).unwrap().count()
        }
    }

    #[tokio::test]
    async fn test_optimize_success_returns_fields_and_references() {
        let harness = Harness::new(StubBackend::replying(REPLY)).await;
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.txt", b"John Doe\nSoftware Engineer"),
                Part::Text("jobDescription", "Backend Engineer, Go"),
            ])
            .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["optimizedResume"], "John Doe - Backend Engineer");
        assert_eq!(body["coverLetter"], "Dear Hiring Manager");

        let resume_pdf = body["resumePdf"].as_str().unwrap();
        let cover_pdf = body["coverLetterPdf"].as_str().unwrap();
        assert!(resume_pdf.starts_with("http://localhost:5000/outputs/Optimized_Resume_"));
        assert!(cover_pdf.starts_with("http://localhost:5000/outputs/Cover_Letter_"));
        assert_eq!(harness.count(&harness.config.output_dir), 2);
        assert_eq!(harness.count(&harness.config.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_rendered_document_is_served() {
        let harness = Harness::new(StubBackend::replying(REPLY)).await;
        let (_, body) = harness
            .post(&[
                Part::Text("jobDescription", "Backend Engineer"),
                Part::File("resume", "resume.txt", b"John Doe"),
            ])
            .await;
        let url = body["coverLetterPdf"].as_str().unwrap();
        let path = url.trim_start_matches("http://localhost:5000");

        let response = harness
            .router()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_missing_job_description_is_rejected_before_generation() {
        let harness = Harness::new(StubBackend::replying(REPLY)).await;
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.txt", b"John Doe"),
                Part::Text("jobDescription", "   "),
            ])
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(harness.backend.calls(), 0);
        assert_eq!(harness.count(&harness.config.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_missing_or_empty_file_is_rejected() {
        let harness = Harness::new(StubBackend::replying(REPLY)).await;

        let (status, _) = harness
            .post(&[Part::Text("jobDescription", "Backend Engineer")])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.pdf", b""),
                Part::Text("jobDescription", "Backend Engineer"),
            ])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(harness.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_resume_is_unprocessable() {
        let harness = Harness::new(StubBackend::replying(REPLY)).await;
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.docx", b"not a zip archive"),
                Part::Text("jobDescription", "Backend Engineer"),
            ])
            .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "EXTRACTION_ERROR");
        assert_eq!(harness.backend.calls(), 0);
        assert_eq!(harness.count(&harness.config.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_bad_gateway() {
        let harness = Harness::new(StubBackend::failing(503, "overloaded")).await;
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.txt", b"John Doe"),
                Part::Text("jobDescription", "Backend Engineer"),
            ])
            .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "GENERATION_UNAVAILABLE");
        assert_eq!(body["details"]["status"], 503);
        assert_eq!(body["details"]["body"], "overloaded");
        assert_eq!(harness.count(&harness.config.output_dir), 0);
    }

    #[tokio::test]
    async fn test_invalid_reply_returns_raw_text() {
        let harness = Harness::new(StubBackend::replying("not json at all")).await;
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.txt", b"John Doe"),
                Part::Text("jobDescription", "Backend Engineer"),
            ])
            .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "INVALID_GENERATION_FORMAT");
        assert_eq!(body["details"]["raw"], "not json at all");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let mut harness = Harness::new(StubBackend::replying(REPLY)).await;
        harness.config.max_upload_bytes = 256;
        let big = vec![b'a'; 4096];
        let (status, body) = harness
            .post(&[
                Part::File("resume", "resume.txt", &big),
                Part::Text("jobDescription", "Backend Engineer"),
            ])
            .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(harness.backend.calls(), 0);
    }
}
