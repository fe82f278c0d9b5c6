//! Error taxonomy shared by every component of the engine.
//!
//! Component operations return [`SyncError`]; the resource lifecycle wraps it
//! in an [`OperationError`] naming the lifecycle step and the resource it was
//! working on, so a caller can decide whether re-applying is worthwhile.

use std::fmt;
use std::path::PathBuf;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Boxed error as produced by object-store backends.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Object-store verb that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Upload,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOp::List => "list",
            StoreOp::Upload => "upload",
            StoreOp::Delete => "delete",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} against bucket {bucket:?} failed: {detail}")]
    Store {
        op: StoreOp,
        bucket: String,
        detail: String,
    },

    #[error("invalid configuration for `{field}`: {message}")]
    Config { field: String, message: String },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn store(op: StoreOp, bucket: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Store {
            op,
            bucket: bucket.into(),
            detail: detail.to_string(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, SyncError::Io { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, SyncError::Store { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, SyncError::Config { .. })
    }
}

/// Lifecycle step of a mirrored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Plan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Plan => "plan",
        })
    }
}

/// A [`SyncError`] raised while running one lifecycle step.
#[derive(Debug, thiserror::Error)]
#[error("{operation} of {resource} failed: {source}")]
pub struct OperationError {
    pub operation: Operation,
    pub resource: String,
    #[source]
    pub source: SyncError,
}

impl OperationError {
    pub fn new(operation: Operation, resource: impl Into<String>, source: SyncError) -> Self {
        Self {
            operation,
            resource: resource.into(),
            source,
        }
    }
}
