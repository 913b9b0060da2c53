//! Error types and failure classification for sync runs.

use thiserror::Error;
use veildav_core::CoreError;
use veildav_crypto::CryptoError;
use veildav_remote::RemoteError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local store error.
    #[error("local: {0}")]
    Local(#[from] CoreError),

    /// Remote collection error.
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    /// Key or cipher error.
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    /// The pass was cancelled.
    #[error("sync interrupted")]
    Interrupted,
}

/// Bucket a failure is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Credentials refused; ends the pass.
    Authorization,
    /// The account may not sync right now.
    Skip,
    /// A precondition failed; the next pull resolves it.
    Conflict,
    /// A component could not be read, written or stored.
    Parse,
    /// A hidden value failed authentication.
    Mac,
    /// Network, server or local store failure.
    Io,
    /// The pass was cancelled.
    Interrupted,
}

impl FailureKind {
    /// Returns true if the failure ends the pass.
    pub fn aborts_pass(&self) -> bool {
        matches!(self, FailureKind::Authorization | FailureKind::Interrupted)
    }

    /// Returns true if the failure withholds the CTag checkpoint.
    pub fn blocks_checkpoint(&self) -> bool {
        !matches!(self, FailureKind::Conflict)
    }
}

impl SyncError {
    /// Classifies the error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SyncError::Local(err) => match err {
                CoreError::InvalidComponent { .. }
                | CoreError::MissingDependency { .. }
                | CoreError::DuplicateUid { .. }
                | CoreError::Serialization(_) => FailureKind::Parse,
                _ => FailureKind::Io,
            },
            SyncError::Remote(err) => match err {
                RemoteError::Unauthorized(_) => FailureKind::Authorization,
                RemoteError::PaymentRequired => FailureKind::Skip,
                RemoteError::PreconditionFailed { .. } => FailureKind::Conflict,
                RemoteError::Rejected { .. }
                | RemoteError::InvalidComponent { .. }
                | RemoteError::DuplicateUid { .. } => FailureKind::Parse,
                RemoteError::InvalidMac { .. } => FailureKind::Mac,
                RemoteError::NotFound { .. } | RemoteError::Transport { .. } => FailureKind::Io,
            },
            SyncError::Crypto(err) if err.is_mac_failure() => FailureKind::Mac,
            SyncError::Crypto(_) => FailureKind::Parse,
            SyncError::Interrupted => FailureKind::Interrupted,
        }
    }
}
