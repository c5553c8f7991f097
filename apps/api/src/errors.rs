use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::pipeline::{FailureKind, PipelineError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details): (StatusCode, &str, String, Option<Value>) =
            match &self {
                AppError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
                }
                AppError::PayloadTooLarge(msg) => (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "PAYLOAD_TOO_LARGE",
                    msg.clone(),
                    None,
                ),
                AppError::Pipeline(e) => {
                    let details = e.details();
                    match e.kind() {
                        FailureKind::Extraction => (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            "EXTRACTION_ERROR",
                            e.to_string(),
                            None,
                        ),
                        FailureKind::GenerationUnavailable => (
                            StatusCode::BAD_GATEWAY,
                            "GENERATION_UNAVAILABLE",
                            "The AI service is unavailable or returned an error".to_string(),
                            details,
                        ),
                        FailureKind::InvalidGenerationFormat => (
                            StatusCode::BAD_GATEWAY,
                            "INVALID_GENERATION_FORMAT",
                            "AI did not return valid JSON".to_string(),
                            details,
                        ),
                        FailureKind::Render => {
                            tracing::error!("Render error: {e}");
                            (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "RENDER_ERROR",
                                "Failed to generate output documents".to_string(),
                                None,
                            )
                        }
                        FailureKind::Internal => {
                            tracing::error!("Internal error: {e:?}");
                            (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                "INTERNAL_ERROR",
                                "An internal server error occurred".to_string(),
                                None,
                            )
                        }
                    }
                }
            };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
