//! Configuration for sync runs.

use std::time::Duration;
use veildav_core::QueueLimits;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wall-clock deadline of one coordinator run.
    pub run_timeout: Duration,
    /// Maximum number of components fetched per remote round trip.
    pub pull_batch_size: usize,
    /// Bounds for local pending queues.
    pub queue_limits: QueueLimits,
    /// Display name used for a new remote collection when the local one has
    /// none.
    pub placeholder_display_name: String,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            run_timeout: Duration::from_secs(300),
            pull_batch_size: 50,
            queue_limits: QueueLimits::default(),
            placeholder_display_name: "Untitled".to_string(),
        }
    }

    /// Sets the run deadline.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Sets the pull batch size. Zero is treated as one.
    #[must_use]
    pub fn with_pull_batch_size(mut self, size: usize) -> Self {
        self.pull_batch_size = size.max(1);
        self
    }

    /// Sets the pending queue bounds.
    #[must_use]
    pub fn with_queue_limits(mut self, limits: QueueLimits) -> Self {
        self.queue_limits = limits;
        self
    }

    /// Sets the placeholder display name.
    #[must_use]
    pub fn with_placeholder_display_name(mut self, name: impl Into<String>) -> Self {
        self.placeholder_display_name = name.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
