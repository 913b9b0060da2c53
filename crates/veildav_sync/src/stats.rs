//! Counters accumulated over a sync run.

use crate::error::{FailureKind, SyncError};
use std::fmt;

/// Statistics about one pass or one whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatistics {
    /// Components created (remotely by push, locally by pull).
    pub inserts: u64,
    /// Components updated.
    pub updates: u64,
    /// Components deleted.
    pub deletes: u64,
    /// Requests skipped because the account may not sync.
    pub skips: u64,
    /// Authorization failures.
    pub auth_failures: u64,
    /// Components that could not be read, written or stored.
    pub parse_failures: u64,
    /// Hidden values that failed authentication.
    pub mac_failures: u64,
    /// Network, server and local store failures.
    pub io_failures: u64,
    /// Precondition failures.
    pub conflicts: u64,
}

impl SyncStatistics {
    /// Counts `error` in its bucket and returns the bucket.
    pub fn record_failure(&mut self, error: &SyncError) -> FailureKind {
        let kind = error.failure_kind();
        match kind {
            FailureKind::Authorization => self.auth_failures += 1,
            FailureKind::Skip => self.skips += 1,
            FailureKind::Conflict => self.conflicts += 1,
            FailureKind::Parse => self.parse_failures += 1,
            FailureKind::Mac => self.mac_failures += 1,
            FailureKind::Io => self.io_failures += 1,
            FailureKind::Interrupted => {}
        }
        kind
    }

    /// Adds every counter of `other`.
    pub fn merge(&mut self, other: &SyncStatistics) {
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.deletes += other.deletes;
        self.skips += other.skips;
        self.auth_failures += other.auth_failures;
        self.parse_failures += other.parse_failures;
        self.mac_failures += other.mac_failures;
        self.io_failures += other.io_failures;
        self.conflicts += other.conflicts;
    }

    /// Returns true if any component was created, updated or deleted.
    pub fn has_changes(&self) -> bool {
        self.inserts + self.updates + self.deletes > 0
    }

    /// Returns true if a failure that withholds the checkpoint was recorded.
    pub fn has_failures(&self) -> bool {
        self.auth_failures + self.skips + self.parse_failures + self.mac_failures + self.io_failures
            > 0
    }

    /// Returns true if credentials were refused.
    pub fn has_auth_failure(&self) -> bool {
        self.auth_failures > 0
    }
}

impl fmt::Display for SyncStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} ~{} -{} (skips {}, auth {}, parse {}, mac {}, io {}, conflicts {})",
            self.inserts,
            self.updates,
            self.deletes,
            self.skips,
            self.auth_failures,
            self.parse_failures,
            self.mac_failures,
            self.io_failures,
            self.conflicts
        )
    }
}
