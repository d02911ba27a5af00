//! Control-plane error types

use stackflow_core::StackError;
use thiserror::Error;

/// Errors returned by control planes and the orchestrator
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Naming collision: the name is taken, by this stack or anyone else
    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A resource this one needs is missing or not usable yet
    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::ResourceAlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
