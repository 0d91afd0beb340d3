use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use huddle_transcription::TranscriptionError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    RateLimited(String),
    UpstreamFailed(String),
    UpstreamTimeout(String),
    Unprocessable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", msg),
            ApiError::UpstreamFailed(msg) => (StatusCode::BAD_GATEWAY, "upstream_failed", msg),
            ApiError::UpstreamTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TranscriptionError> for ApiError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::UpstreamRateLimited { .. } => {
                ApiError::RateLimited(err.to_string())
            }
            TranscriptionError::UpstreamServerError { .. }
            | TranscriptionError::UpstreamMalformedResponse
            | TranscriptionError::UpstreamRejected { .. }
            | TranscriptionError::Transport(_) => ApiError::UpstreamFailed(err.to_string()),
            TranscriptionError::UpstreamTimeout => ApiError::UpstreamTimeout(err.to_string()),
            TranscriptionError::NormalizationFailed(_) => ApiError::Unprocessable(err.to_string()),
        }
    }
}
