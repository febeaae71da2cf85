//! Error types for the offerdesk library.

use std::{fmt, path::PathBuf};

use serde::Serialize;
use thiserror::Error;

/// One structural problem found while validating a plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Dotted path to the offending value, e.g. `filters[1].op`
    pub path: String,
    /// Human readable description of the violation
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A plan document failed its grammar.
///
/// Carries every issue found, not just the first, so operators can see the
/// whole shape of a bad model response at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("plan validation failed: {}", summarize(.issues))]
pub struct PlanValidationError {
    pub issues: Vec<Issue>,
}

impl PlanValidationError {
    /// Returns true when some issue points at exactly `path`.
    pub fn mentions(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

fn summarize(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Comprehensive error type for all offerdesk operations.
#[derive(Error, Debug)]
pub enum DeskError {
    /// The caller sent an unusable request (e.g. an empty message)
    #[error("{reason}")]
    InvalidRequest { reason: String },
    /// The model's output was not JSON or did not match the plan grammar
    #[error("{reason}")]
    UpstreamPlanInvalid {
        reason: String,
        raw: String,
        issues: Vec<Issue>,
    },
    /// A pipeline contained a data-mutating or code-executing stage
    #[error("Forbidden stage in pipeline: {stage}")]
    UnsafePipeline { stage: String },
    /// A plan referenced a field outside the canonical catalog
    #[error("Unknown field '{field}' at {path}")]
    UnknownField { path: String, field: String },
    /// The store failed while executing a compiled query
    #[error("{message}")]
    Execution { message: String },
    /// The model could not be reached or answered with a transport error
    #[error("Oracle error: {message}")]
    Oracle { message: String },
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> DeskError {
        DeskError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> DeskError {
        DeskError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl DeskError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Wraps a model response that failed to parse or validate.
    pub fn upstream(raw: impl Into<String>, reason: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self::UpstreamPlanInvalid {
            reason: reason.into(),
            raw: raw.into(),
            issues,
        }
    }

    /// HTTP-class status this error surfaces as.
    ///
    /// Request, plan and pipeline problems are the caller's (400); store
    /// and infrastructure failures are ours (500); a dead model is 502.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. }
            | Self::UpstreamPlanInvalid { .. }
            | Self::UnsafePipeline { .. }
            | Self::UnknownField { .. }
            | Self::InvalidInput { .. } => 400,
            Self::Oracle { .. } => 502,
            Self::Execution { .. }
            | Self::Database { .. }
            | Self::FileSystem { .. }
            | Self::XdgDirectory(_)
            | Self::Serialization { .. }
            | Self::Configuration { .. } => 500,
        }
    }

    /// Raw model text, present only for upstream plan failures.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::UpstreamPlanInvalid { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| DeskError::database(message).with_source(e))
    }
}

/// Result type alias for offerdesk operations
pub type Result<T> = std::result::Result<T, DeskError>;
