//! Error types for Deckhand core types.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while resolving identifiers and pod specifications.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("task {task} not found in pod instance {pod_instance}")]
    TaskNotFound { pod_instance: String, task: String },
}
