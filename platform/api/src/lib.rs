use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    /// Rebuild an error from the `code` extension of a GraphQL error payload.
    /// Unknown or missing codes are treated as internal.
    pub fn from_code(code: Option<&str>, message: &str) -> Self {
        match code {
            Some("UNAUTHORIZED") => ApiError::Unauthorized,
            Some("NOT_FOUND") => ApiError::NotFound,
            Some("INVALID_INPUT") => {
                let detail = message.strip_prefix("bad request: ").unwrap_or(message);
                ApiError::InvalidInput(detail.to_string())
            }
            other => {
                debug!(code = ?other, %message, "unmapped remote error code");
                ApiError::internal(anyhow::anyhow!("{message}"))
            }
        }
    }

    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Internal(_))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::InvalidInput(_) = self {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

/// Error entry of a GraphQL response as seen by a client.
#[derive(Clone, Debug, Deserialize)]
pub struct GraphqlErrorPayload {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensionsPayload>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorExtensionsPayload {
    #[serde(default)]
    pub code: Option<String>,
}

impl From<&GraphqlErrorPayload> for ApiError {
    fn from(payload: &GraphqlErrorPayload) -> Self {
        let code = payload
            .extensions
            .as_ref()
            .and_then(|ext| ext.code.as_deref());
        ApiError::from_code(code, &payload.message)
    }
}
