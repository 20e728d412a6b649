use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures seen by the client side of a form exchange.
///
/// `Display` is the text that follows `Error: ` in an alert.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request never completed (connection refused, reset, ...).
    #[error("{0}")]
    Transport(String),

    /// Non-OK status with a JSON `{message}` body.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Non-OK status without a usable message.
    #[error("Network response was not ok ({0})")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

/// Failures returned by the backend handlers. Rendered as `{message}` JSON.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        ServiceError::Internal(format!("database error: {}", err))
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Internal(ref detail) = self {
            tracing::error!("request failed: {}", detail);
        }
        let status = self.status();
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
