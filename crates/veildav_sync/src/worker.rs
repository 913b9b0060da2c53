//! The per-collection sync worker.
//!
//! One [`SyncWorker::run`] is one pass over one local/remote collection pair:
//!
//! 1. ensure the remote collection exists and is managed
//! 2. snapshot both CTags into a [`PassContext`]
//! 3. push metadata, deletions, updates and creations, in that order
//! 4. decide whether a pull is needed
//! 5. pull metadata, creations, changes and removals
//! 6. advance the local CTag if nothing went wrong
//!
//! Failures are contained per item and counted in [`SyncStatistics`]; only
//! authorization failures and cancellation end a pass early.

use crate::cancel::CancelHandle;
use crate::config::SyncConfig;
use crate::error::{FailureKind, SyncError, SyncResult};
use crate::stats::SyncStatistics;
use std::collections::HashMap;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use veildav_core::{CTag, Component, CoreError, ETag, LocalCollection, LocalComponent, LocalId};
use veildav_remote::{RemoteCollection, RemoteError};

/// CTags captured once, before pushing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassContext {
    /// CTag recorded locally at the last successful pass.
    pub local_ctag: Option<CTag>,
    /// CTag reported by the server when the pass started.
    pub remote_ctag: Option<CTag>,
}

impl PassContext {
    /// Returns true if both CTags are known and equal.
    pub fn ctags_agree(&self) -> bool {
        self.local_ctag.is_some() && self.local_ctag == self.remote_ctag
    }

    /// Returns true if the snapshot alone requires a pull.
    pub fn remote_may_have_changed(&self) -> bool {
        self.local_ctag.is_none() || self.local_ctag != self.remote_ctag
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Every step ran; `checkpointed` tells whether the CTag advanced.
    Completed {
        /// The local CTag was advanced.
        checkpointed: bool,
    },
    /// The pass stopped early.
    Aborted(FailureKind),
}

/// Result of one pass.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Collection path.
    pub path: String,
    /// Counters of this pass.
    pub statistics: SyncStatistics,
    /// How the pass ended.
    pub outcome: WorkerOutcome,
}

impl WorkerReport {
    /// Returns true if the local CTag was advanced.
    pub fn checkpointed(&self) -> bool {
        matches!(self.outcome, WorkerOutcome::Completed { checkpointed: true })
    }
}

/// Counts `result`'s error in `stats` unless it ends the pass.
///
/// `Ok(None)` means the error was contained and the caller moves on.
fn absorb<T, E: Into<SyncError>>(
    stats: &mut SyncStatistics,
    result: Result<T, E>,
) -> SyncResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let err = err.into();
            if err.failure_kind().aborts_pass() {
                return Err(err);
            }
            let kind = stats.record_failure(&err);
            warn!(error = %err, ?kind, "contained failure");
            Ok(None)
        }
    }
}

fn is_rejection(err: &RemoteError) -> bool {
    matches!(
        err,
        RemoteError::Rejected { .. } | RemoteError::InvalidComponent { .. }
    )
}

#[derive(Debug, Clone, Copy)]
enum Tally {
    Insert,
    Update,
    Delete,
}

/// Local mutations staged but not yet committed, credited on commit.
#[derive(Debug, Default)]
struct Staged {
    inserts: u64,
    updates: u64,
    deletes: u64,
}

impl Staged {
    fn bump(&mut self, tally: Tally) {
        match tally {
            Tally::Insert => self.inserts += 1,
            Tally::Update => self.updates += 1,
            Tally::Delete => self.deletes += 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Staging<C> {
    Add(C, Option<ETag>),
    Update(LocalId, C, Option<ETag>),
    Remove(LocalId),
}

#[derive(Debug, PartialEq, Eq)]
enum StageOutcome {
    Staged,
    MissingDependency,
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Metadata {
    DisplayName,
    Color,
}

/// Runs one pass over one collection pair.
pub struct SyncWorker<C: Component> {
    local: Box<dyn LocalCollection<C>>,
    remote: Box<dyn RemoteCollection<C>>,
    config: SyncConfig,
    cancel: CancelHandle,
    stats: SyncStatistics,
    staged: Staged,
}

impl<C: Component> SyncWorker<C> {
    /// Creates a worker.
    pub fn new(
        local: Box<dyn LocalCollection<C>>,
        remote: Box<dyn RemoteCollection<C>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local,
            remote,
            config,
            cancel: CancelHandle::new(),
            stats: SyncStatistics::default(),
            staged: Staged::default(),
        }
    }

    /// Uses `cancel` to observe cancellation requests.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the pass. The remote collection is closed whatever happens.
    pub fn run(mut self) -> WorkerReport {
        let path = self.local.path().to_string();
        let span = info_span!("sync_pass", path = %path, kind = %C::KIND);
        let _enter = span.enter();

        let outcome = match self.pass() {
            Ok(checkpointed) => WorkerOutcome::Completed { checkpointed },
            Err(err) => {
                let kind = self.stats.record_failure(&err);
                warn!(error = %err, "pass aborted");
                WorkerOutcome::Aborted(kind)
            }
        };

        self.local.discard_pending();
        if let Err(err) = self.remote.close() {
            debug!(error = %err, "closing remote collection failed");
        }
        info!(stats = %self.stats, ?outcome, "pass finished");

        WorkerReport {
            path,
            statistics: self.stats,
            outcome,
        }
    }

    fn pass(&mut self) -> SyncResult<bool> {
        self.cancel.check()?;
        let name = self
            .local
            .display_name()
            .ok()
            .flatten()
            .unwrap_or_else(|| self.config.placeholder_display_name.clone());
        if absorb(&mut self.stats, self.remote.ensure_collection(&name))?.is_none() {
            return Ok(false);
        }

        let context = self.snapshot();
        debug!(?context, "pass context");

        self.cancel.check()?;
        self.push_metadata(Metadata::DisplayName, &context)?;
        self.push_metadata(Metadata::Color, &context)?;
        self.push_deletions()?;
        self.push_updates()?;
        self.push_creations()?;

        self.cancel.check()?;
        if !self.stats.has_changes() && !context.remote_may_have_changed() {
            debug!("collection unchanged, skipping pull");
            return Ok(false);
        }

        let remote_ctag = self.pull()?;
        self.checkpoint(remote_ctag)
    }

    fn snapshot(&mut self) -> PassContext {
        let local_ctag = self.local.ctag().unwrap_or_else(|err| {
            warn!(error = %err, "local ctag unreadable");
            None
        });
        let remote_ctag = self.remote.ctag().unwrap_or_else(|err| {
            warn!(error = %err, "remote ctag unreadable");
            None
        });
        PassContext {
            local_ctag,
            remote_ctag,
        }
    }

    fn checkpoint(&mut self, remote_ctag: Option<CTag>) -> SyncResult<bool> {
        if self.stats.has_failures() {
            info!(stats = %self.stats, "checkpoint withheld");
            return Ok(false);
        }
        let Some(ctag) = remote_ctag else {
            return Ok(false);
        };
        let stored = absorb(&mut self.stats, self.local.set_ctag(&ctag))?.is_some();
        if stored {
            debug!(%ctag, "checkpoint advanced");
        }
        Ok(stored)
    }

    // push

    fn local_metadata(&self, which: Metadata) -> Result<Option<String>, CoreError> {
        match which {
            Metadata::DisplayName => self.local.display_name(),
            Metadata::Color => self.local.color(),
        }
    }

    fn push_metadata(&mut self, which: Metadata, context: &PassContext) -> SyncResult<()> {
        let local = self.local_metadata(which);
        let Some(Some(local)) = absorb(&mut self.stats, local)? else {
            return Ok(());
        };
        let remote = match which {
            Metadata::DisplayName => self.remote.hidden_display_name(),
            Metadata::Color => self.remote.hidden_color(),
        };
        let Some(remote) = absorb(&mut self.stats, remote)? else {
            return Ok(());
        };

        let push = match remote {
            None => true,
            Some(remote) => remote != local && context.ctags_agree(),
        };
        if !push {
            return Ok(());
        }
        debug!(?which, "pushing collection metadata");
        let written = match which {
            Metadata::DisplayName => self.remote.set_hidden_display_name(&local),
            Metadata::Color => self.remote.set_hidden_color(&local),
        };
        absorb(&mut self.stats, written)?;
        Ok(())
    }

    fn fetch_local(&mut self, id: LocalId) -> SyncResult<Option<LocalComponent<C>>> {
        Ok(absorb(&mut self.stats, self.local.component_by_id(id))?.flatten())
    }

    /// Commits what `staged` put in the queue; false if nothing was applied.
    fn commit_staged(&mut self, staged: Result<(), CoreError>) -> SyncResult<bool> {
        if absorb(&mut self.stats, staged)?.is_none() {
            self.local.discard_pending();
            return Ok(false);
        }
        self.commit_queue()
    }

    /// Commits the whole queue. A commit that applies fewer operations than
    /// were queued is treated as having applied none.
    fn commit_queue(&mut self) -> SyncResult<bool> {
        let queued = self.local.pending_operations();
        let committed = self.local.commit().and_then(|applied| {
            if applied < queued {
                Err(CoreError::commit_failed(format!(
                    "applied {applied} of {queued} operations"
                )))
            } else {
                Ok(())
            }
        });
        let applied = absorb(&mut self.stats, committed)?.is_some();
        if !applied {
            self.local.discard_pending();
        }
        Ok(applied)
    }

    fn drop_rejected(&mut self, id: LocalId, err: RemoteError) -> SyncResult<()> {
        warn!(%id, error = %err, "server refused component, dropping local copy");
        self.stats.record_failure(&SyncError::from(err));
        let staged = self.local.queue_remove(id);
        self.commit_staged(staged)?;
        Ok(())
    }

    fn refresh_after_batch(&mut self, pushed: usize) -> SyncResult<()> {
        if pushed > 0 {
            absorb(&mut self.stats, self.remote.refresh_properties())?;
        }
        Ok(())
    }

    fn push_deletions(&mut self) -> SyncResult<()> {
        let Some(ids) = absorb(&mut self.stats, self.local.deleted_ids())? else {
            return Ok(());
        };
        let mut pushed = 0;
        for id in ids {
            self.cancel.check()?;
            let Some(local) = self.fetch_local(id)? else {
                continue;
            };
            if let Some(uid) = local.uid() {
                match self.remote.remove_component(uid, local.etag.as_ref()) {
                    Ok(()) | Err(RemoteError::NotFound { .. }) => {}
                    Err(err) => {
                        absorb::<(), _>(&mut self.stats, Err(err))?;
                        continue;
                    }
                }
            }
            let staged = self.local.queue_remove(id);
            if self.commit_staged(staged)? {
                self.stats.deletes += 1;
                pushed += 1;
            }
        }
        self.refresh_after_batch(pushed)
    }

    fn push_updates(&mut self) -> SyncResult<()> {
        let Some(ids) = absorb(&mut self.stats, self.local.updated_ids())? else {
            return Ok(());
        };
        let mut pushed = 0;
        for id in ids {
            self.cancel.check()?;
            let Some(local) = self.fetch_local(id)? else {
                continue;
            };
            let written = match &local.etag {
                Some(etag) => self.remote.update_hidden_component(&local.component, etag),
                None => self.remote.add_hidden_component(&local.component),
            };
            match written {
                Ok(etag) => {
                    let staged = self.local.queue_clear_dirty(id, etag);
                    if self.commit_staged(staged)? {
                        self.stats.updates += 1;
                        pushed += 1;
                    }
                }
                Err(err) if is_rejection(&err) => self.drop_rejected(id, err)?,
                Err(err) => {
                    absorb::<(), _>(&mut self.stats, Err(err))?;
                }
            }
        }
        self.refresh_after_batch(pushed)
    }

    fn push_creations(&mut self) -> SyncResult<()> {
        let Some(ids) = absorb(&mut self.stats, self.local.new_ids())? else {
            return Ok(());
        };
        let mut pushed = 0;
        for id in ids {
            self.cancel.check()?;
            let uid = Uuid::new_v4().to_string();
            let staged = self.local.queue_assign_uid(id, uid.clone());
            if !self.commit_staged(staged)? {
                continue;
            }
            let Some(local) = self.fetch_local(id)? else {
                continue;
            };

            match self.remote.add_hidden_component(&local.component) {
                Ok(etag) => {
                    let staged = self.local.queue_clear_dirty(id, etag);
                    if self.commit_staged(staged)? {
                        debug!(%uid, "pushed new component");
                        self.stats.inserts += 1;
                        pushed += 1;
                    }
                }
                Err(err) if is_rejection(&err) => self.drop_rejected(id, err)?,
                Err(err) if err.is_retryable() => {
                    absorb::<(), _>(&mut self.stats, Err(err))?;
                    let staged = self.local.queue_mark_for_retry(id);
                    self.commit_staged(staged)?;
                }
                Err(err) => {
                    absorb::<(), _>(&mut self.stats, Err(err))?;
                }
            }
        }
        self.refresh_after_batch(pushed)
    }

    // pull

    fn pull(&mut self) -> SyncResult<Option<CTag>> {
        self.cancel.check()?;
        let remote_ctag = match absorb(&mut self.stats, self.remote.refresh_properties())? {
            Some(()) => absorb(&mut self.stats, self.remote.ctag())?.flatten(),
            None => None,
        };
        self.pull_metadata()?;

        let Some(remote_etags) = absorb(&mut self.stats, self.remote.list_etags())? else {
            return Ok(remote_ctag);
        };
        let Some(local_index) = absorb(&mut self.stats, self.local.uid_index())? else {
            return Ok(remote_ctag);
        };

        let mut created: Vec<String> = remote_etags
            .keys()
            .filter(|uid| !local_index.contains_key(*uid))
            .cloned()
            .collect();
        created.sort();

        let mut changed: Vec<(String, LocalId)> = remote_etags
            .iter()
            .filter_map(|(uid, etag)| {
                let (id, local_etag) = local_index.get(uid)?;
                (local_etag.as_ref() != Some(etag)).then(|| (uid.clone(), *id))
            })
            .collect();
        changed.sort();

        let mut purged: Vec<LocalId> = local_index
            .iter()
            .filter(|(uid, (_, etag))| etag.is_some() && !remote_etags.contains_key(*uid))
            .map(|(_, (id, _))| *id)
            .collect();
        purged.sort();

        debug!(
            created = created.len(),
            changed = changed.len(),
            purged = purged.len(),
            "pull plan"
        );

        self.pull_created(&created)?;
        self.pull_changed(&changed)?;
        self.pull_purged(&purged)?;
        Ok(remote_ctag)
    }

    fn pull_metadata(&mut self) -> SyncResult<()> {
        let name = self.remote.hidden_display_name();
        if let Some(Some(name)) = absorb(&mut self.stats, name)? {
            let applied = self.local.set_display_name(Some(&name));
            absorb(&mut self.stats, applied)?;
        }
        let color = self.remote.hidden_color();
        if let Some(Some(color)) = absorb(&mut self.stats, color)? {
            let applied = self.local.set_color(Some(&color));
            absorb(&mut self.stats, applied)?;
        }
        Ok(())
    }

    fn pull_created(&mut self, uids: &[String]) -> SyncResult<()> {
        let mut deferred = Vec::new();
        for chunk in uids.chunks(self.config.pull_batch_size.max(1)) {
            self.cancel.check()?;
            let fetched = self.remote.get_hidden_components(chunk);
            let Some(batch) = absorb(&mut self.stats, fetched)? else {
                continue;
            };
            for failure in batch.failures {
                absorb::<(), _>(&mut self.stats, Err(failure))?;
            }
            for pair in batch.components {
                let (component, etag) = pair.into_parts();
                let staging = Staging::Add(component, etag);
                if self.stage(&staging, Tally::Insert)? == StageOutcome::MissingDependency {
                    deferred.push(staging);
                }
            }
        }
        self.flush()?;

        if deferred.is_empty() {
            return Ok(());
        }
        debug!(count = deferred.len(), "retrying components with missing dependencies");
        for staging in deferred {
            if self.stage(&staging, Tally::Insert)? == StageOutcome::MissingDependency {
                if let Staging::Add(component, _) = &staging {
                    let err = CoreError::MissingDependency {
                        uid: component.uid().unwrap_or_default().to_string(),
                        parent: component.depends_on().unwrap_or_default().to_string(),
                    };
                    absorb::<(), _>(&mut self.stats, Err(err))?;
                }
            }
        }
        self.flush()
    }

    fn pull_changed(&mut self, changed: &[(String, LocalId)]) -> SyncResult<()> {
        let ids: HashMap<&str, LocalId> = changed
            .iter()
            .map(|(uid, id)| (uid.as_str(), *id))
            .collect();
        let uids: Vec<String> = changed.iter().map(|(uid, _)| uid.clone()).collect();

        for chunk in uids.chunks(self.config.pull_batch_size.max(1)) {
            self.cancel.check()?;
            let fetched = self.remote.get_hidden_components(chunk);
            let Some(batch) = absorb(&mut self.stats, fetched)? else {
                continue;
            };
            for failure in batch.failures {
                absorb::<(), _>(&mut self.stats, Err(failure))?;
            }
            for pair in batch.components {
                let (component, etag) = pair.into_parts();
                let Some(id) = component.uid().and_then(|uid| ids.get(uid)).copied() else {
                    continue;
                };
                self.stage(&Staging::Update(id, component, etag), Tally::Update)?;
            }
        }
        self.flush()
    }

    fn pull_purged(&mut self, ids: &[LocalId]) -> SyncResult<()> {
        for id in ids {
            self.cancel.check()?;
            self.stage(&Staging::Remove(*id), Tally::Delete)?;
        }
        self.flush()
    }

    /// Stages one mutation, committing first when the queue is full.
    fn stage(&mut self, staging: &Staging<C>, tally: Tally) -> SyncResult<StageOutcome> {
        let mut flushed = false;
        loop {
            let result = match staging.clone() {
                Staging::Add(component, etag) => self.local.queue_add(component, etag),
                Staging::Update(id, component, etag) => self.local.queue_update(id, component, etag),
                Staging::Remove(id) => self.local.queue_remove(id),
            };
            match result {
                Ok(()) => {
                    self.staged.bump(tally);
                    if self.local.is_queue_full() {
                        self.flush()?;
                    }
                    return Ok(StageOutcome::Staged);
                }
                Err(CoreError::QueueFull { .. }) if !flushed => {
                    self.flush()?;
                    flushed = true;
                }
                Err(CoreError::MissingDependency { .. }) => {
                    return Ok(StageOutcome::MissingDependency);
                }
                Err(err) => {
                    absorb::<(), _>(&mut self.stats, Err(err))?;
                    return Ok(StageOutcome::Failed);
                }
            }
        }
    }

    /// Commits the queue and credits what it held.
    fn flush(&mut self) -> SyncResult<()> {
        let staged = std::mem::take(&mut self.staged);
        if self.local.pending_operations() == 0 {
            return Ok(());
        }
        if self.commit_queue()? {
            self.stats.inserts += staged.inserts;
            self.stats.updates += staged.updates;
            self.stats.deletes += staged.deletes;
        }
        Ok(())
    }
}
