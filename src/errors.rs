use axum::http::StatusCode;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::provider::auth::AuthError;
use crate::provider::ProviderError;

/// Stable, inspectable classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    TokenTimeout,
    Provider,
    ProviderTimeout,
    Persistence,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Authentication => "authentication_error",
            ErrorKind::TokenTimeout => "token_timeout",
            ErrorKind::Provider => "provider_error",
            ErrorKind::ProviderTimeout => "provider_timeout",
            ErrorKind::Persistence => "persistence_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Authentication {
        context: String,
        #[source]
        source: AuthError,
    },

    #[error("{context}: timeout while getting access token")]
    TokenTimeout { context: String },

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },

    #[error("{context}: provider request timed out")]
    ProviderTimeout { context: String },

    #[error("{context}: {reason}")]
    Persistence { context: String, reason: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Wraps an authentication failure. A transport timeout during the token
    /// exchange is reported as a token timeout.
    pub fn from_auth(context: &str, err: AuthError) -> Self {
        if err.is_timeout() {
            return AppError::TokenTimeout {
                context: context.to_string(),
            };
        }
        AppError::Authentication {
            context: context.to_string(),
            source: err,
        }
    }

    pub fn from_provider(context: &str, err: ProviderError) -> Self {
        if matches!(err, ProviderError::Timeout) {
            return AppError::ProviderTimeout {
                context: context.to_string(),
            };
        }
        AppError::Provider {
            context: context.to_string(),
            source: err,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Authentication { .. } => ErrorKind::Authentication,
            AppError::TokenTimeout { .. } => ErrorKind::TokenTimeout,
            AppError::Provider { .. } => ErrorKind::Provider,
            AppError::ProviderTimeout { .. } => ErrorKind::ProviderTimeout,
            AppError::Persistence { .. } => ErrorKind::Persistence,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Provider { source, .. } if source.is_not_found())
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Provider if self.is_not_found() => StatusCode::NOT_FOUND,
            ErrorKind::TokenTimeout | ErrorKind::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A body that is not JSON, or does not fit the request type, is a client
/// error like any other invalid input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let (code, msg) = match kind {
            ErrorKind::Validation => ("invalid_request", self.to_string()),
            ErrorKind::Provider if self.is_not_found() => ("not_found", self.to_string()),
            ErrorKind::Provider => {
                tracing::error!(error = %self, "provider request failed");
                ("provider_failed", self.to_string())
            }
            ErrorKind::TokenTimeout | ErrorKind::ProviderTimeout => {
                tracing::warn!(error = %self, "request timed out");
                ("timeout", self.to_string())
            }
            ErrorKind::Authentication => {
                tracing::error!(error = %self, "provider authentication failed");
                ("authentication_failed", "failed to authenticate with provider".to_string())
            }
            ErrorKind::Persistence | ErrorKind::Internal => {
                tracing::error!(error = %self, "internal failure");
                ("internal_server_error", "internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": kind.as_str(),
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
