use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::responses::RequestMeta;

pub const E_VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const E_NOT_FOUND: &str = "NOT_FOUND";
pub const E_CONFLICT: &str = "CONFLICT";
pub const E_UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const E_FORBIDDEN: &str = "FORBIDDEN";
pub const E_CONFIRMATION_REQUIRED: &str = "CONFIRMATION_REQUIRED";
pub const E_BAD_CREDENTIALS: &str = "BAD_CREDENTIALS";
pub const E_STORAGE_FAILURE: &str = "STORAGE_FAILURE";

pub type DashboardResult<T> = Result<T, DashboardError>;

/// Errors raised by store commands.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

#[derive(Debug)]
pub struct ApiErrorWithMeta {
    error: ApiError,
    meta: RequestMeta,
    code: Option<String>,
}

impl ApiError {
    pub fn with_meta(self, meta: RequestMeta) -> ApiErrorWithMeta {
        ApiErrorWithMeta {
            error: self,
            meta,
            code: None,
        }
    }

    /// Maps a store error onto its HTTP shape and stable code.
    pub fn from_dashboard(err: DashboardError, meta: RequestMeta) -> ApiErrorWithMeta {
        let (api, code) = match err {
            DashboardError::NotFound(_) => (ApiError::NotFound(err.to_string()), E_NOT_FOUND),
            DashboardError::Validation(msg) => (ApiError::BadRequest(msg), E_VALIDATION_FAILED),
            DashboardError::Conflict(msg) => (ApiError::Conflict(msg), E_CONFLICT),
            DashboardError::Storage(_) | DashboardError::Serialization(_) => {
                (ApiError::Internal(err.into()), E_STORAGE_FAILURE)
            }
        };
        api.with_meta(meta).with_code(code)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiErrorWithMeta {
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

impl IntoResponse for ApiErrorWithMeta {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let error_message = match self.error {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => {
                warn!(request_id = %self.meta.request_id, code = ?self.code, "{msg}");
                msg
            }
            ApiError::Internal(e) => {
                error!(request_id = %self.meta.request_id, "internal error: {:?}", e);
                "internal server error".to_string()
            }
        };

        let mut body = json!({
            "request_id": self.meta.request_id,
            "error": error_message,
        });
        if let Some(code) = self.code {
            body["code"] = json!(code);
        }

        (status, Json(body)).into_response()
    }
}
