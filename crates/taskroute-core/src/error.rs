//! Error types for TaskRoute.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} already has a routing decision")]
    AlreadyRouted { task_id: String },

    #[error("Task cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Backend {backend} failed: {reason}")]
    BackendExecution { backend: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing error category, serialized into `{kind, message}` bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    AlreadyRouted,
    InvalidTransition,
    BackendExecutionFailure,
    DependencyFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::AlreadyRouted => "already_routed",
            Self::InvalidTransition => "invalid_transition",
            Self::BackendExecutionFailure => "backend_execution_failure",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Json(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyRouted { .. } => ErrorKind::AlreadyRouted,
            Error::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Error::BackendExecution { .. } => ErrorKind::BackendExecutionFailure,
            Error::Database(_) | Error::Storage(_) | Error::Io(_) => ErrorKind::DependencyFailure,
            Error::Notification(_) | Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only backend failures are worth another attempt; everything else is
    /// either a caller mistake or a dependency outage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackendExecution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_errors_share_kind() {
        assert_eq!(Error::Database("locked".into()).kind(), ErrorKind::DependencyFailure);
        assert_eq!(Error::Storage("disk full".into()).kind(), ErrorKind::DependencyFailure);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(Error::from(io).kind(), ErrorKind::DependencyFailure);
    }

    #[test]
    fn test_only_backend_failures_retry() {
        let backend = Error::BackendExecution {
            backend: "fast-llm".into(),
            reason: "timeout".into(),
        };
        assert!(backend.is_retryable());
        assert!(!Error::InvalidInput("x".into()).is_retryable());
        assert!(!Error::AlreadyRouted { task_id: "t".into() }.is_retryable());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_value(ErrorKind::BackendExecutionFailure).unwrap();
        assert_eq!(json, "backend_execution_failure");
        assert_eq!(ErrorKind::AlreadyRouted.as_str(), "already_routed");
    }
}
