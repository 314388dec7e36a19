// Error types for the Seafile API client.
//
// The variants separate "the service could not be reached" (`Transport`)
// from "the service answered with something we did not expect" (`Decode`,
// `UnexpectedStatus`, `Cardinality`) so callers can report them differently.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, body read).
    #[error("{operation}: transport error: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Credentials were rejected, the token response was unusable, or an
    /// authenticated call was made before `authenticate`.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The response body did not have the expected shape.
    #[error("{operation}: unexpected response body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The service answered with a status the operation does not accept.
    #[error("unexpected response code for {operation} {path}: {status}")]
    UnexpectedStatus {
        operation: &'static str,
        path: String,
        status: StatusCode,
    },

    #[error("file not found in repository: {path}")]
    NotFound { path: String },

    /// An upload returned some number of results other than exactly one.
    #[error("expected number of uploaded items to be 1, was {count}")]
    Cardinality { count: usize },

    #[error("unable to read local file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    /// The HTTP status carried by the error, if the service responded at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
