use axum::{
    extract::multipart::MultipartError,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::process::ProcessError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("server is busy, try again shortly")]
    Busy,
    #[error("too many requests, retry in {0} seconds")]
    RateLimited(u64),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Process(err) => match err {
                ProcessError::MissingInput
                | ProcessError::TooManyImages { .. }
                | ProcessError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
                ProcessError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ProcessError::UnreadableMetadata(_)
                | ProcessError::AllWidthsExceedOriginal(_)
                | ProcessError::NoImagesProcessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ProcessError::EncodingFailure(_) | ProcessError::Archive(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Multipart(err) => err.status(),
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let mut body = json!({ "error": self.to_string() });
        if let AppError::Process(ProcessError::NoImagesProcessable { skipped }) = &self {
            body["skipped"] = skipped
                .iter()
                .map(|s| json!({ "name": s.original_name, "reason": s.reason.to_string() }))
                .collect();
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited(secs) = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
