//! HTTP error responses for the bbs-tally API.
//!
//! Every failure answers 500. Degraded sites are not failures: they travel
//! inside a 200 payload with their own per-site status.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use tally_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Any route except the batch trigger; body `{error}`.
    #[error(transparent)]
    Core(#[from] Error),

    /// The manual batch job died before reporting; body `{status: "error", message}`.
    #[error("batch failed: {0}")]
    Batch(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        tracing::error!(error = %self, "request failed");
        let body = match self {
            ApiError::Core(e) => json!({ "error": e.to_string() }),
            ApiError::Batch(message) => json!({ "status": "error", "message": message }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
