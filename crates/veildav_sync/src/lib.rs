//! # veildav sync
//!
//! Sync worker and coordinator for veildav.
//!
//! This crate provides:
//! - [`SyncWorker`]: one push-then-pull pass over one local/remote collection
//!   pair, with ETag/CTag change detection
//! - [`SyncCoordinator`]: collection discovery, one worker thread per pair, a
//!   run deadline and notification decisions
//! - [`SyncStatistics`] and [`FailureKind`]: how failures are counted
//!
//! ## Key Invariants
//!
//! - Local changes are pushed before remote changes are pulled
//! - The local CTag only advances after a pass without failures, so anything
//!   missed is picked up by the next pass
//! - One unreadable or refused component never blocks the rest of its
//!   collection
//! - Only refused credentials and cancellation end a pass early

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod coordinator;
mod error;
mod stats;
mod worker;

pub use cancel::CancelHandle;
pub use config::SyncConfig;
pub use coordinator::{NotificationDecision, RunReport, SyncCoordinator, SyncRequest};
pub use error::{FailureKind, SyncError, SyncResult};
pub use stats::SyncStatistics;
pub use worker::{PassContext, SyncWorker, WorkerOutcome, WorkerReport};
