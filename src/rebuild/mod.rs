//! The rebuild state machine.
//!
//! `run` either starts a rebuild (resolve, back up, reset onto the custom
//! branch) or resumes one from the checkpoint, then replays the remaining
//! light commits oldest first. The checkpoint is written as soon as the
//! branch has been reset and after every replayed commit, so it is on disk
//! whenever the branch is half rebuilt; a drained queue deletes it.

use crate::backup::{BackupManager, BackupOutcome};
use crate::config::Config;
use crate::errors::{CONFLICT_EXIT_CODE, RebuildError, VcsError};
use crate::resolver::{RevisionQueue, RevisionResolver};
use crate::rules::{BackupBranchName, DecorationRules};
use crate::status::{RebuildCheckpoint, StatusStore};
use crate::vcs::{ReplayOutcome, VcsBackend};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Operator-facing progress of a rebuild.
pub trait RebuildReporter {
    /// Commits about to be replayed on a fresh start (also shown by a dry run).
    fn planned(&self, summaries: &[String]);
    /// A checkpoint was found; `summaries` may be empty.
    fn resuming(&self, summaries: &[String]);
    /// A staged conflict fix is about to be committed.
    fn committing(&self);
    fn backup(&self, outcome: &BackupOutcome);
    fn picking(&self, summary: &str);
    fn already_applied(&self, summary: &str);
}

/// How a `run` ended, short of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RebuildOutcome {
    /// Queue drained, checkpoint deleted
    Completed { replayed: usize, already_applied: usize },
    /// Preview only, nothing was touched
    DryRun { planned: RevisionQueue },
    /// Stopped on a conflict, checkpoint saved for the next run
    Conflicted {
        checkpoint: RebuildCheckpoint,
        paths: Vec<String>,
    },
    /// The backend refused to replay the front commit (a merge, for one)
    ReplayFailed {
        checkpoint: RebuildCheckpoint,
        reason: String,
    },
}

impl RebuildOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RebuildOutcome::Completed { .. } | RebuildOutcome::DryRun { .. } => 0,
            RebuildOutcome::Conflicted { .. } | RebuildOutcome::ReplayFailed { .. } => {
                CONFLICT_EXIT_CODE
            }
        }
    }
}

/// In-progress rebuild as shown by `status`.
#[derive(Debug, Clone)]
pub struct RebuildStatus {
    pub checkpoint: RebuildCheckpoint,
    /// One-line summaries of `checkpoint.revisions_remaining`
    pub remaining: Vec<String>,
}

enum StartOutcome {
    Preview(RevisionQueue),
    Ready(RebuildCheckpoint),
}

pub struct RebuildController<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
    config: &'a Config,
    rules: &'a DecorationRules,
    reporter: &'a dyn RebuildReporter,
    store: StatusStore,
    cancel: Arc<AtomicBool>,
}

impl<'a, B: VcsBackend + ?Sized> RebuildController<'a, B> {
    pub fn new(
        backend: &'a B,
        config: &'a Config,
        rules: &'a DecorationRules,
        reporter: &'a dyn RebuildReporter,
    ) -> Self {
        Self {
            backend,
            config,
            rules,
            reporter,
            store: StatusStore::new(config.status_file.clone()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `flag` as the interrupt signal checked before each replay.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Start or resume a rebuild.
    pub fn run(
        &self,
        base_override: Option<&str>,
        dry_run: bool,
    ) -> Result<RebuildOutcome, RebuildError> {
        let branch = self.backend.current_branch()?;
        if branch != self.config.light_branch {
            return Err(RebuildError::WrongBranch {
                expected: self.config.light_branch.clone(),
                actual: branch,
            });
        }

        let in_progress = self.store.exists();
        if in_progress && base_override.is_some() {
            return Err(RebuildError::InvalidArguments(
                "rebuild in progress, no base revision argument expected".to_string(),
            ));
        }
        if in_progress && dry_run {
            return Err(RebuildError::InvalidArguments(
                "rebuild in progress, a resume cannot be previewed".to_string(),
            ));
        }

        let checkpoint = match self.store.load()? {
            Some(checkpoint) => self.resume(checkpoint)?,
            None => match self.start(base_override, dry_run)? {
                StartOutcome::Preview(planned) => return Ok(RebuildOutcome::DryRun { planned }),
                StartOutcome::Ready(checkpoint) => checkpoint,
            },
        };
        self.store.save(&checkpoint)?;

        self.replay(checkpoint)
    }

    /// Restore the light branch from the recorded backup and forget the rebuild.
    pub fn abort(&self) -> Result<BackupBranchName, RebuildError> {
        let checkpoint = self.store.load()?.ok_or(RebuildError::NothingToAbort)?;
        let backup = checkpoint.backup_branch;

        self.backend
            .hard_reset_to(backup.as_str())
            .map_err(|source| RebuildError::ResetFailed {
                target: backup.to_string(),
                source,
            })?;
        self.store.clear()?;

        info!(backup = %backup, "rebuild aborted");
        Ok(backup)
    }

    /// The in-progress rebuild, if any.
    pub fn status(&self) -> Result<Option<RebuildStatus>, RebuildError> {
        let Some(checkpoint) = self.store.load()? else {
            return Ok(None);
        };
        let remaining = checkpoint
            .revisions_remaining
            .iter()
            .map(|rev| {
                self.backend
                    .one_line_summary(rev)
                    .unwrap_or_else(|_| rev.to_string())
            })
            .collect();
        Ok(Some(RebuildStatus {
            checkpoint,
            remaining,
        }))
    }

    fn start(
        &self,
        base_override: Option<&str>,
        dry_run: bool,
    ) -> Result<StartOutcome, RebuildError> {
        if !self.config.repo_dir.join(".git").exists() {
            return Err(RebuildError::NotARepository(self.config.repo_dir.clone()));
        }
        if self.backend.has_uncommitted_changes()? || !self.backend.is_index_empty()? {
            return Err(RebuildError::UncommittedChanges);
        }

        let resolver = RevisionResolver::new(self.backend, self.rules, self.config.lookback_limit);
        if resolver.is_base_already_custom()? {
            return Err(RebuildError::NothingToDo(self.config.custom_branch.clone()));
        }

        let queue = match base_override {
            Some(base) => resolver.list_revisions_from(base).map_err(|e| match e {
                VcsError::UnknownRevision(rev) => {
                    RebuildError::InvalidArguments(format!("unknown base revision '{}'", rev))
                }
                other => other.into(),
            })?,
            None => resolver
                .light_revisions()?
                .ok_or_else(|| RebuildError::BaseNotFound {
                    custom: self.config.custom_branch.clone(),
                    limit: self.config.lookback_limit,
                })?,
        };
        if queue.is_empty() {
            return Err(RebuildError::NoCommitsToReplay);
        }

        self.reporter.planned(&self.summaries(&queue)?);
        if dry_run {
            debug!(planned = queue.len(), "dry run, stopping before any change");
            return Ok(StartOutcome::Preview(queue));
        }

        let backup = BackupManager::new(self.backend, self.rules).ensure_backup()?;
        self.reporter.backup(&backup);

        let custom = &self.config.custom_branch;
        self.backend
            .hard_reset_to(custom)
            .map_err(|source| RebuildError::ResetFailed {
                target: custom.clone(),
                source,
            })?;
        info!(onto = %custom, commits = queue.len(), "starting rebuild");

        Ok(StartOutcome::Ready(RebuildCheckpoint::new(
            queue,
            backup.into_name(),
        )))
    }

    fn resume(&self, checkpoint: RebuildCheckpoint) -> Result<RebuildCheckpoint, RebuildError> {
        self.reporter
            .resuming(&self.summaries(&checkpoint.revisions_remaining)?);

        let committed = if self.backend.is_index_empty()? {
            false
        } else {
            self.reporter.committing();
            let id = self
                .backend
                .commit_no_edit()
                .map_err(RebuildError::CommitFailed)?;
            debug!(commit = %id, "committed staged fix");
            true
        };

        if !checkpoint.conflicted {
            return Ok(checkpoint);
        }
        if !committed && checkpoint.stopped_at.as_ref() == Some(&self.backend.head()?) {
            warn!(
                rev = ?checkpoint.front(),
                "no fix was committed for the stopped commit, replaying it again"
            );
            return Ok(checkpoint.retried());
        }
        // The stopped front is done once its fix is committed
        Ok(checkpoint.advanced())
    }

    fn replay(&self, mut checkpoint: RebuildCheckpoint) -> Result<RebuildOutcome, RebuildError> {
        let mut replayed = 0;
        let mut already_applied = 0;

        while let Some(rev) = checkpoint.front().cloned() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(remaining = checkpoint.revisions_remaining.len(), "interrupted");
                return Err(RebuildError::Interrupted);
            }

            let summary = self.backend.one_line_summary(&rev)?;
            self.reporter.picking(&summary);
            match self.backend.cherry_pick(&rev) {
                Ok(ReplayOutcome::Applied(id)) => {
                    debug!(rev = %rev, new = %id, "replayed");
                    replayed += 1;
                }
                Ok(ReplayOutcome::AlreadyApplied) => {
                    self.reporter.already_applied(&summary);
                    already_applied += 1;
                }
                Ok(ReplayOutcome::Conflict { paths }) => {
                    let checkpoint = self.stop(&checkpoint)?;
                    info!(rev = %rev, conflicts = paths.len(), "stopped on conflict");
                    return Ok(RebuildOutcome::Conflicted { checkpoint, paths });
                }
                Err(e) => {
                    let checkpoint = self.stop(&checkpoint)?;
                    warn!(rev = %rev, error = %e, "replay failed");
                    return Ok(RebuildOutcome::ReplayFailed {
                        checkpoint,
                        reason: e.to_string(),
                    });
                }
            }

            checkpoint = checkpoint.advanced();
            self.store.save(&checkpoint)?;
        }

        self.store.clear()?;
        info!(replayed, already_applied, "rebuild complete");
        Ok(RebuildOutcome::Completed {
            replayed,
            already_applied,
        })
    }

    /// Record that the front commit awaits the operator, at the current HEAD.
    fn stop(&self, checkpoint: &RebuildCheckpoint) -> Result<RebuildCheckpoint, RebuildError> {
        let stopped = checkpoint.with_conflict(self.backend.head()?);
        self.store.save(&stopped)?;
        Ok(stopped)
    }

    fn summaries(&self, queue: &RevisionQueue) -> Result<Vec<String>, RebuildError> {
        queue
            .iter()
            .map(|rev| self.backend.one_line_summary(rev).map_err(Into::into))
            .collect()
    }
}
