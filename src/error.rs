use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Common error message constants, kept in one place so handlers and
/// adapters report the same wording.
pub mod msg {
    pub const ENTRY_NOT_FOUND: &str = "Billing entry not found";
    pub const PROVIDER_REQUIRED: &str = "Field 'provider' is required";
    pub const UNKNOWN_PROVIDER: &str = "Unknown payment provider";
    pub const TX_ID_REQUIRED: &str =
        "Either 'provider_tx_id' or 'provider_tx_ids' must be supplied";
    pub const NEGATIVE_AMOUNT: &str = "Field 'amount' must be non-negative";
    pub const INVALID_ADMIN_KEY: &str = "Invalid admin key";
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::UpstreamTimeout(e.to_string())
        } else {
            AppError::Upstream(e.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::ConfigurationMissing(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Configuration missing",
                Some(msg.clone()),
            ),
            AppError::UpstreamTimeout(msg) => {
                tracing::error!("Upstream timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout", None)
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            ok: false,
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
