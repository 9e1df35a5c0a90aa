use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

/// Error body sent to clients. `data` is always null on failure so the
/// envelope shape matches successful responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub error: String,
}

/// Application error surfaced at the HTTP boundary. Clients never see a
/// stack trace; the `error` string is a short cause.
#[derive(Debug)]
pub enum AppError {
    /// Missing or malformed inbound parameter.
    Validation { message: String },
    /// The upstream answered, but the entity does not exist.
    NotFound { message: String },
    /// Upstream transport or semantic failure (timeout, 5xx,
    /// success:false body).
    Upstream { message: String },
    /// Anything else that went wrong inside the edge itself.
    Internal { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Validation { message }
            | Self::NotFound { message }
            | Self::Upstream { message }
            | Self::Internal { message } => message,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorBody {
            success: false,
            data: serde_json::Value::Null,
            error: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("unexpected error: {err}"))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::validation("missing id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("no such match").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::upstream("provider timeout").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_is_the_short_message() {
        let err = AppError::upstream("provider timeout");
        assert_eq!(err.to_string(), "provider timeout");
    }
}
