//! Error types for the relay host's HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::bridge::TabId;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", Some(msg)),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", Some(msg)),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Parse a tab id taken from a path or query string.
pub fn parse_tab(raw: &str) -> Result<TabId, WebError> {
    raw.parse()
        .map_err(|e| WebError::BadRequest(format!("invalid tab id {raw:?}: {e}")))
}
