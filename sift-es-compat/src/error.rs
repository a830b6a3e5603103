//! Elasticsearch-style error envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors rendered in the Elasticsearch wire format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EsError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    IllegalArgument(String),

    #[error("Validation Failed: 1: {0};")]
    Validation(String),

    #[error("{0}")]
    MediaType(String),

    #[error("Invalid index name [{index}], {reason}")]
    InvalidIndexName { index: String, reason: String },

    #[error("no such index [{0}]")]
    IndexNotFound(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),
}

/// Elasticsearch-style error response
#[derive(Debug, Serialize)]
pub struct EsErrorResponse {
    pub error: EsErrorDetail,
    pub status: u16,
}

#[derive(Debug, Serialize)]
pub struct EsErrorDetail {
    pub root_cause: Vec<RootCause>,
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RootCause {
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

impl EsError {
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_exception",
            Self::IllegalArgument(_) => "illegal_argument_exception",
            Self::Validation(_) => "action_request_validation_exception",
            Self::MediaType(_) => "media_type_header_exception",
            Self::InvalidIndexName { .. } => "invalid_index_name_exception",
            Self::IndexNotFound(_) => "index_not_found_exception",
            Self::Unauthenticated(_) | Self::Forbidden(_) => "security_exception",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(_)
            | Self::IllegalArgument(_)
            | Self::Validation(_)
            | Self::MediaType(_)
            | Self::InvalidIndexName { .. } => StatusCode::BAD_REQUEST,
            Self::IndexNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn index(&self) -> Option<String> {
        match self {
            Self::IndexNotFound(index) | Self::InvalidIndexName { index, .. } => {
                Some(index.clone())
            }
            _ => None,
        }
    }

    /// Build the `{"error": {...}, "status": N}` envelope
    pub fn envelope(&self) -> EsErrorResponse {
        let error_type = self.error_type().to_string();
        let reason = self.to_string();
        let index = self.index();

        EsErrorResponse {
            error: EsErrorDetail {
                root_cause: vec![RootCause {
                    error_type: error_type.clone(),
                    reason: reason.clone(),
                    index: index.clone(),
                }],
                error_type,
                reason,
                index,
            },
            status: self.status_code().as_u16(),
        }
    }
}

impl IntoResponse for EsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, axum::Json(self.envelope())).into_response()
    }
}
