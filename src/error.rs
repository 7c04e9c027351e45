//! Error types for the Redfish emulator
//!
//! Provides structured error types for the resource store, the lifecycle
//! engine, the type registry and the HTTP surface, plus the mapping from
//! each error to the status code a client sees.

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the emulator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Resource not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Malformed JSON document at {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Invalid data in POST body: {0}")]
    InvalidInput(String),

    #[error("{resource} member already exists: {id}")]
    Conflict { resource: String, id: String },

    #[error("Invalid resource identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    #[error("Path template {template} expects {expected} identifiers, got {actual}")]
    TemplateArity {
        template: String,
        expected: usize,
        actual: usize,
    },

    // =========================================================================
    // API Errors
    // =========================================================================
    #[error("{message}")]
    Authentication { message: String, status: StatusCode },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Registry file parse error: {0}")]
    RegistryFile(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code a client receives for this error.
    ///
    /// A duplicate identifier keeps the legacy `404` status so existing
    /// clients keep working; only the body shape changed.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Authentication { status, .. } => *status,
            Error::InvalidInput(_) | Error::InvalidIdentifier { .. } | Error::JsonParse(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Conflict { .. } | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable tag used as the `error` field of API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal_error",
            Error::Configuration(_) => "configuration_error",
            Error::NotFound { .. } => "not_found",
            Error::Decode { .. } => "malformed_document",
            Error::InvalidInput(_) => "invalid_input",
            Error::Conflict { .. } => "duplicate_member",
            Error::InvalidIdentifier { .. } => "invalid_identifier",
            Error::TemplateArity { .. } => "template_arity",
            Error::Authentication { .. } => "authentication_failed",
            Error::JsonParse(_) => "invalid_json",
            Error::RegistryFile(_) => "registry_file",
            Error::Io(_) => "io_error",
        }
    }

    /// Whether the error is reported to clients without details
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Shorthand for a not-found error on `path`
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }
}

/// Result type alias for the emulator
pub type Result<T> = std::result::Result<T, Error>;
