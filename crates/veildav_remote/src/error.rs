//! Error types for the remote side.

use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a remote collection.
///
/// The first six variants mirror server responses; the last three are raised
/// while interpreting what the server returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials were refused (401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The account needs payment before it may sync (402).
    #[error("payment required")]
    PaymentRequired,

    /// An If-Match precondition did not hold (412).
    #[error("precondition failed for {uid}")]
    PreconditionFailed {
        /// UID of the component written.
        uid: String,
    },

    /// The target does not exist on the server.
    #[error("not found: {target}")]
    NotFound {
        /// Path or UID that was not found.
        target: String,
    },

    /// The server refused a body as structurally invalid (400/415).
    #[error("server rejected {uid}: {message}")]
    Rejected {
        /// UID of the component written.
        uid: String,
        /// Server explanation.
        message: String,
    },

    /// Network failure or server error (5xx).
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the request may succeed if retried.
        retryable: bool,
    },

    /// A listing returned the same UID twice.
    #[error("duplicate uid {uid} in remote listing")]
    DuplicateUid {
        /// The duplicated UID.
        uid: String,
    },

    /// A component could not be turned into a valid record.
    #[error("invalid component {uid}: {message}")]
    InvalidComponent {
        /// UID of the component.
        uid: String,
        /// What went wrong.
        message: String,
        /// True when the server content itself is malformed.
        server_fault: bool,
    },

    /// A hidden value failed authentication; wrong key or tampered data.
    #[error("authentication tag mismatch for {uid}")]
    InvalidMac {
        /// UID of the component (or name of the property).
        uid: String,
    },
}

impl RemoteError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Creates an invalid component error.
    pub fn invalid_component(
        uid: impl Into<String>,
        message: impl ToString,
        server_fault: bool,
    ) -> Self {
        Self::InvalidComponent {
            uid: uid.into(),
            message: message.to_string(),
            server_fault,
        }
    }

    /// Returns true for credential failures.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                retryable: true,
                ..
            }
        )
    }

    /// Returns true if the error concerns one component's content.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::InvalidComponent { .. } | Self::InvalidMac { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_transient_transport() {
        assert!(RemoteError::transport_retryable("reset").is_retryable());
        assert!(!RemoteError::transport_fatal("closed").is_retryable());
        assert!(!RemoteError::PaymentRequired.is_retryable());
    }

    #[test]
    fn item_failures() {
        assert!(RemoteError::InvalidMac { uid: "u".into() }.is_item_failure());
        assert!(RemoteError::invalid_component("u", "bad", true).is_item_failure());
        assert!(!RemoteError::not_found("u").is_item_failure());
        assert!(RemoteError::Unauthorized("nope".into()).is_unauthorized());
    }

    #[test]
    fn display() {
        let err = RemoteError::PreconditionFailed { uid: "u1".into() };
        assert_eq!(err.to_string(), "precondition failed for u1");
    }
}
