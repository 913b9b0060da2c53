//! Error types for the local side.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the local store or while handling components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error while persisting local state.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization of a component or snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A component is structurally invalid.
    #[error("invalid component: {message}")]
    InvalidComponent {
        /// What is wrong with the component.
        message: String,
    },

    /// A component references a parent that is not present locally.
    #[error("component {uid} depends on missing component {parent}")]
    MissingDependency {
        /// UID of the dependent component.
        uid: String,
        /// UID of the missing parent.
        parent: String,
    },

    /// A UID is already used in the collection.
    #[error("duplicate uid {uid} in collection {path}")]
    DuplicateUid {
        /// Collection path.
        path: String,
        /// The duplicated UID.
        uid: String,
    },

    /// The collection does not exist in the local store.
    #[error("local collection not found: {path}")]
    CollectionNotFound {
        /// Collection path.
        path: String,
    },

    /// No component with this local id.
    #[error("local component {id} not found")]
    ComponentNotFound {
        /// The local id.
        id: u64,
    },

    /// Staging would exceed the pending queue bounds.
    #[error("pending queue full: {operations} operations, {bytes} bytes")]
    QueueFull {
        /// Operations currently queued.
        operations: usize,
        /// Bytes currently queued.
        bytes: usize,
    },

    /// The store refused to apply a batch.
    #[error("commit failed: {reason}")]
    CommitFailed {
        /// Why the batch was refused.
        reason: String,
    },
}

impl CoreError {
    /// Creates an invalid component error.
    pub fn invalid_component(message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            message: message.into(),
        }
    }

    /// Creates a commit failed error.
    pub fn commit_failed(reason: impl Into<String>) -> Self {
        Self::CommitFailed {
            reason: reason.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Returns true if the error describes the component itself rather than
    /// the store.
    pub fn is_component_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidComponent { .. }
                | CoreError::MissingDependency { .. }
                | CoreError::DuplicateUid { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
