//! Safety-net branches taken before the light branch is rewritten.

use crate::errors::{RebuildError, VcsError};
use crate::rules::{BackupBranchName, DecorationRules};
use crate::vcs::VcsBackend;
use tracing::info;

/// What [`BackupManager::ensure_backup`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// HEAD already carried a backup branch from a previous attempt
    Reused(BackupBranchName),
    /// A new backup branch was created at HEAD
    Created(BackupBranchName),
}

impl BackupOutcome {
    pub fn name(&self) -> &BackupBranchName {
        match self {
            BackupOutcome::Reused(name) | BackupOutcome::Created(name) => name,
        }
    }

    pub fn into_name(self) -> BackupBranchName {
        match self {
            BackupOutcome::Reused(name) | BackupOutcome::Created(name) => name,
        }
    }
}

pub struct BackupManager<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
    rules: &'a DecorationRules,
}

impl<'a, B: VcsBackend + ?Sized> BackupManager<'a, B> {
    pub fn new(backend: &'a B, rules: &'a DecorationRules) -> Self {
        Self { backend, rules }
    }

    /// The backup branch already pointing at HEAD, if any.
    pub fn head_backup(&self) -> Result<Option<BackupBranchName>, VcsError> {
        let decorations = self.backend.head_decorations()?;
        Ok(self.rules.find_light_backup(&decorations))
    }

    /// Name the next backup branch would get.
    pub fn next_backup_name(&self) -> Result<BackupBranchName, VcsError> {
        let branches = self.backend.branches()?;
        Ok(self
            .rules
            .light_backup()
            .next_name(branches.iter().map(String::as_str)))
    }

    /// Make sure a backup branch points at HEAD, creating one if needed.
    pub fn ensure_backup(&self) -> Result<BackupOutcome, RebuildError> {
        if let Some(existing) = self.head_backup()? {
            info!(branch = %existing, "reusing backup branch at HEAD");
            return Ok(BackupOutcome::Reused(existing));
        }

        let name = self.next_backup_name()?;
        self.backend
            .create_branch(name.as_str())
            .map_err(|source| RebuildError::BackupFailed {
                name: name.to_string(),
                source,
            })?;
        info!(branch = %name, "created backup branch");
        Ok(BackupOutcome::Created(name))
    }
}
