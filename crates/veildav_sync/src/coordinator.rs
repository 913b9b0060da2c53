//! Runs one sync pass for every collection of an account.

use crate::cancel::CancelHandle;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::stats::SyncStatistics;
use crate::worker::{SyncWorker, WorkerReport};
use std::collections::BTreeSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use veildav_core::{Component, CoreError, CoreResult, LocalAccount};
use veildav_crypto::CipherService;
use veildav_remote::{HidingCollection, RemoteAccount, RemoteCollection};

/// Options of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Only sync collections that have local changes. Newly discovered
    /// collections are synced regardless.
    pub local_changes_only: bool,
}

impl SyncRequest {
    /// A run over every collection.
    pub fn full() -> Self {
        Self::default()
    }

    /// A run over collections with local changes.
    pub fn local_changes_only() -> Self {
        Self {
            local_changes_only: true,
        }
    }
}

/// What to do with the persistent authorization notice after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    /// Credentials were refused; show the notice.
    ShowAuthNotice,
    /// The notice is showing and credentials work again; dismiss it.
    DismissAuthNotice,
    /// Nothing to do.
    Silent,
}

impl NotificationDecision {
    /// Decides from the run statistics and whether the notice is showing.
    pub fn decide(statistics: &SyncStatistics, auth_notice_active: bool) -> Self {
        if statistics.has_auth_failure() {
            NotificationDecision::ShowAuthNotice
        } else if auth_notice_active {
            NotificationDecision::DismissAuthNotice
        } else {
            NotificationDecision::Silent
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Counters summed over every collection and discovery.
    pub statistics: SyncStatistics,
    /// One report per finished pass.
    pub collections: Vec<WorkerReport>,
    /// Collections skipped for lack of local changes.
    pub skipped: Vec<String>,
    /// Collections whose pass did not finish before the deadline.
    pub timed_out: Vec<String>,
}

impl RunReport {
    /// Decides what to do with the authorization notice.
    pub fn notification(&self, auth_notice_active: bool) -> NotificationDecision {
        NotificationDecision::decide(&self.statistics, auth_notice_active)
    }

    /// The report of one collection, if its pass finished.
    pub fn collection(&self, path: &str) -> Option<&WorkerReport> {
        self.collections.iter().find(|report| report.path == path)
    }

    fn record(&mut self, error: &SyncError) {
        let kind = self.statistics.record_failure(error);
        warn!(error = %error, ?kind, "run-level failure");
    }
}

struct Pair {
    path: String,
    first_discovery: bool,
}

/// Syncs every collection of one local account with its remote account.
pub struct SyncCoordinator<C: Component> {
    local: Arc<dyn LocalAccount<C>>,
    remote: Arc<dyn RemoteAccount>,
    cipher: Arc<dyn CipherService>,
    config: SyncConfig,
    cancel: CancelHandle,
}

impl<C: Component> SyncCoordinator<C> {
    /// Creates a coordinator.
    pub fn new(
        local: Arc<dyn LocalAccount<C>>,
        remote: Arc<dyn RemoteAccount>,
        cipher: Arc<dyn CipherService>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            remote,
            cipher,
            config,
            cancel: CancelHandle::new(),
        }
    }

    /// A handle that interrupts running workers.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs one pass per collection and waits for them, up to the deadline.
    ///
    /// Passes still running at the deadline are abandoned, not interrupted,
    /// and reported as timed out. Only callers set the cancel handle.
    pub fn run(&self, request: &SyncRequest) -> RunReport {
        let span = info_span!("sync_run", kind = %C::KIND);
        let _enter = span.enter();
        let started = Instant::now();
        let mut report = RunReport::default();

        match self.discover(&mut report) {
            Ok(pairs) => self.run_pairs(pairs, request, &mut report),
            Err(err) => report.record(&err),
        }

        self.remote.release_connections();
        info!(
            stats = %report.statistics,
            finished = report.collections.len(),
            skipped = report.skipped.len(),
            timed_out = report.timed_out.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        report
    }

    /// Aligns the local collections with the remote ones.
    ///
    /// A local collection missing remotely is dropped once it has been
    /// synced; one that never was is kept so its pass creates it remotely.
    /// A collection that cannot be read is recorded and left out.
    fn discover(&self, report: &mut RunReport) -> SyncResult<Vec<Pair>> {
        let remote_paths: BTreeSet<String> = self.remote.collection_paths()?.into_iter().collect();
        let local_paths: BTreeSet<String> = self.local.collection_paths()?.into_iter().collect();

        let mut pairs = Vec::new();
        for path in local_paths.difference(&remote_paths) {
            match self.retire_local(path) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(path = %path, "local collection not yet on server");
                    pairs.push(Pair {
                        path: path.clone(),
                        first_discovery: true,
                    });
                }
                Err(err) => report.record(&SyncError::from(err)),
            }
        }
        for path in &remote_paths {
            let first_discovery = !local_paths.contains(path);
            if first_discovery {
                info!(path = %path, "discovered remote collection");
                if let Err(err) = self.local.create_collection(path) {
                    report.record(&SyncError::from(err));
                    continue;
                }
            }
            pairs.push(Pair {
                path: path.clone(),
                first_discovery,
            });
        }
        pairs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(pairs)
    }

    /// Drops a local-only collection that has been synced before; true if
    /// it was dropped.
    fn retire_local(&self, path: &str) -> CoreResult<bool> {
        if self.local.open(path)?.ctag()?.is_none() {
            return Ok(false);
        }
        info!(path = %path, "remote collection gone, dropping local copy");
        self.local.drop_collection(path)?;
        Ok(true)
    }

    fn prepare(&self, pair: &Pair, request: &SyncRequest) -> SyncResult<Option<SyncWorker<C>>> {
        let local = self.local.open(&pair.path)?;
        if request.local_changes_only && !pair.first_discovery {
            let changed = local.has_local_changes().unwrap_or(true);
            if !changed {
                return Ok(None);
            }
        }
        let transport = self.remote.open(&pair.path)?;
        let remote: Box<dyn RemoteCollection<C>> =
            Box::new(HidingCollection::new(transport, Arc::clone(&self.cipher)));
        Ok(Some(
            SyncWorker::new(local, remote, self.config.clone()).with_cancel(self.cancel.clone()),
        ))
    }

    fn run_pairs(&self, pairs: Vec<Pair>, request: &SyncRequest, report: &mut RunReport) {
        let (sender, receiver) = mpsc::channel();
        let mut running = BTreeSet::new();

        for pair in pairs {
            let worker = match self.prepare(&pair, request) {
                Ok(Some(worker)) => worker,
                Ok(None) => {
                    debug!(path = %pair.path, "no local changes, skipping");
                    report.skipped.push(pair.path);
                    continue;
                }
                Err(err) => {
                    report.record(&err);
                    continue;
                }
            };

            let sender = sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("veildav-sync {}", pair.path))
                .spawn(move || {
                    // The receiver is gone once the deadline passed.
                    let _ = sender.send(worker.run());
                });
            match spawned {
                Ok(_) => {
                    running.insert(pair.path);
                }
                Err(err) => report.record(&SyncError::Local(CoreError::Io(err))),
            }
        }
        drop(sender);

        let deadline = Instant::now() + self.config.run_timeout;
        while !running.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(worker_report) => {
                    running.remove(&worker_report.path);
                    report.statistics.merge(&worker_report.statistics);
                    report.collections.push(worker_report);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(pending = running.len(), "run deadline passed, abandoning workers");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(pending = running.len(), "workers ended without a report");
                    break;
                }
            }
        }
        report.timed_out = running.into_iter().collect();
    }
}
