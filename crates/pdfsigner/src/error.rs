use std::error::Error;
use std::path::PathBuf;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid object store address {address}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },
    #[error("Missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("Object store is not configured, cannot access {0}")]
    StoreNotConfigured(String),
    #[error("Source {address} is unavailable: {source}")]
    SourceUnavailable { address: String, source: BoxError },
    #[error("Signing failed: {0}")]
    SigningFailed(#[source] BoxError),
    #[error("Failed to commit {address}: {source}")]
    CommitFailed { address: String, source: BoxError },
    #[error("Method not allowed")]
    DispatchRejected,
    #[error("Invalid request: {0}")]
    ParseFailed(String),
    #[error("Can't read and write from the same directory: {}", .0.display())]
    SameDirectory(PathBuf),
}

impl SignerError {
    pub fn source_unavailable(address: &str, source: impl Into<BoxError>) -> Self {
        Self::SourceUnavailable {
            address: address.to_string(),
            source: source.into(),
        }
    }

    pub fn commit_failed(address: &str, source: impl Into<BoxError>) -> Self {
        Self::CommitFailed {
            address: address.to_string(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SignerError::DispatchRejected => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for SignerError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParseFailed(error.to_string())
    }
}

/// Every failure is reported to the caller as plain text carrying its description.
impl IntoResponse for SignerError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            self.to_string(),
        )
            .into_response()
    }
}
