//! Error types for document loading, operation resolution and invocation.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Iri;

/// Errors while loading or parsing a resource document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to fetch {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    // Document errors (exit code 2)
    #[error("invalid document at {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("unresolvable reference {reference} at {path}")]
    BrokenRef { path: String, reference: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::NetworkError { .. }
            | LoadError::HttpStatus { .. } => 3,
            _ => 2,
        }
    }
}

/// Every way resolving or invoking a semantic operation can fail.
#[derive(Debug, Error)]
pub enum HypermediaError {
    /// The resource document could not be obtained. Fatal to the client.
    #[error("cannot load resource document: {0}")]
    DocumentLoad(#[from] LoadError),

    /// No operation (or relation) satisfies the requested concept.
    #[error("no operation found for {concept}")]
    NoMatchingOperation { concept: Iri },

    /// A required parameter was absent from the parameter map.
    ///
    /// Raised before any request is issued.
    #[error("operation {operation} requires parameter {parameter}")]
    MissingParameter { operation: String, parameter: Iri },

    /// The invoked operation did not complete with a 2xx response.
    ///
    /// `status` is `None` when no response was received at all.
    #[error("{method} {url} failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    OperationFailed {
        method: String,
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The representation does not carry the requested property.
    #[error("property {property} not found in representation")]
    PropertyNotFound { property: Iri },
}

impl HypermediaError {
    /// HTTP status of a failed operation, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            HypermediaError::OperationFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// True when the operation failed with 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the caller can keep its already-loaded state and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HypermediaError::OperationFailed { .. } | HypermediaError::PropertyNotFound { .. }
        )
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            HypermediaError::DocumentLoad(e) => e.exit_code(),
            HypermediaError::OperationFailed { status: Some(404), .. } => 4,
            HypermediaError::OperationFailed { .. } => 3,
            _ => 2,
        }
    }
}

/// Single mismatch between a representation and its declared schema.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShapeError {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors reading server configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a socket address (e.g. 0.0.0.0:3000), got '{value}'")]
    InvalidBind { var: &'static str, value: String },

    #[error("unknown API version '{value}': expected v1, v2 or v3")]
    UnknownVersion { value: String },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
