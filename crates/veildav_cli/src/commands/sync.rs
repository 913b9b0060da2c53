//! Sync command implementation.

use super::{load_key, CliError};
use crate::Kind;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use veildav_core::{Component, Contact, Event, FileStateStore, LocalStore};
use veildav_crypto::AesGcmCipher;
use veildav_remote::MemoryServer;
use veildav_sync::{
    NotificationDecision, RunReport, SyncConfig, SyncCoordinator, SyncRequest, WorkerOutcome,
};

/// Files a sync reads and writes.
#[derive(Debug, Clone)]
pub struct SyncFiles {
    /// Local store snapshot.
    pub local: PathBuf,
    /// Sync state.
    pub state: PathBuf,
    /// Server snapshot.
    pub remote: PathBuf,
    /// Hex key file.
    pub key: PathBuf,
}

/// Summary of a run, as printed.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Components inserted on either side.
    pub inserts: u64,
    /// Components updated on either side.
    pub updates: u64,
    /// Components deleted on either side.
    pub deletes: u64,
    /// Failures of any kind, conflicts excluded.
    pub failures: u64,
    /// Precondition conflicts.
    pub conflicts: u64,
    /// One entry per finished pass.
    pub collections: Vec<CollectionSummary>,
    /// Collections skipped for lack of local changes.
    pub skipped: Vec<String>,
    /// Collections that missed the deadline.
    pub timed_out: Vec<String>,
}

/// One finished pass.
#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    /// Collection path.
    pub path: String,
    /// Counters in short form.
    pub statistics: String,
    /// How the pass ended.
    pub outcome: String,
}

impl From<&RunReport> for SyncSummary {
    fn from(report: &RunReport) -> Self {
        let stats = &report.statistics;
        Self {
            inserts: stats.inserts,
            updates: stats.updates,
            deletes: stats.deletes,
            failures: stats.skips
                + stats.auth_failures
                + stats.parse_failures
                + stats.mac_failures
                + stats.io_failures,
            conflicts: stats.conflicts,
            collections: report
                .collections
                .iter()
                .map(|c| CollectionSummary {
                    path: c.path.clone(),
                    statistics: c.statistics.to_string(),
                    outcome: describe(c.outcome),
                })
                .collect(),
            skipped: report.skipped.clone(),
            timed_out: report.timed_out.clone(),
        }
    }
}

fn describe(outcome: WorkerOutcome) -> String {
    match outcome {
        WorkerOutcome::Completed { checkpointed: true } => "checkpointed".to_string(),
        WorkerOutcome::Completed { checkpointed: false } => "completed".to_string(),
        WorkerOutcome::Aborted(kind) => format!("aborted ({kind:?})"),
    }
}

/// Runs the sync command.
pub fn run(
    files: &SyncFiles,
    kind: Kind,
    local_changes_only: bool,
    timeout_secs: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::default().with_run_timeout(Duration::from_secs(timeout_secs));
    let request = if local_changes_only {
        SyncRequest::local_changes_only()
    } else {
        SyncRequest::full()
    };

    let report = match kind {
        Kind::Contacts => run_kind::<Contact>(files, "contacts/", config, &request)?,
        Kind::Events => run_kind::<Event>(files, "calendars/", config, &request)?,
    };

    let summary = SyncSummary::from(&report);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_text_output(&summary),
    }

    if report.notification(false) == NotificationDecision::ShowAuthNotice {
        return Err(CliError::Unauthorized.into());
    }
    Ok(())
}

/// Runs the coordinator over `files` for collections under `prefix`.
pub fn run_kind<C: Component>(
    files: &SyncFiles,
    prefix: &str,
    config: SyncConfig,
    request: &SyncRequest,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let key = load_key(&files.key)?;
    let state = Arc::new(FileStateStore::open(&files.state)?);
    let store: LocalStore<C> = LocalStore::open_file(&files.local, state, config.queue_limits)?;
    let server = MemoryServer::open_file(&files.remote)?;

    info!(local = ?files.local, remote = ?files.remote, %prefix, "starting sync");
    let coordinator = SyncCoordinator::new(
        Arc::new(store),
        Arc::new(server.account(prefix)),
        Arc::new(AesGcmCipher::new(&key)),
        config,
    );
    Ok(coordinator.run(request))
}

fn print_text_output(summary: &SyncSummary) {
    println!(
        "✓ Sync finished: +{} ~{} -{} ({} failures, {} conflicts)",
        summary.inserts, summary.updates, summary.deletes, summary.failures, summary.conflicts
    );
    for collection in &summary.collections {
        println!(
            "  {}: {} [{}]",
            collection.path, collection.statistics, collection.outcome
        );
    }
    for path in &summary.skipped {
        println!("  {path}: skipped, no local changes");
    }
    for path in &summary.timed_out {
        println!("  {path}: did not finish in time");
    }
}
