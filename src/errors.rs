//! Typed error hierarchy for light-rebuild.
//!
//! Two enums cover the two layers:
//! - `VcsError`: failures reported by the version-control backend
//! - `RebuildError`: precondition, resolution and fatal failures of a rebuild
//!
//! A replay conflict is not an error: it is reported as
//! [`crate::rebuild::RebuildOutcome::Conflicted`] and exits with
//! [`CONFLICT_EXIT_CODE`].

use thiserror::Error;

/// Exit status used when a replay stopped on a conflict and a checkpoint was left behind.
pub const CONFLICT_EXIT_CODE: i32 = 4;

/// Errors from the version-control backend.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Unknown revision '{0}'")]
    UnknownRevision(String),

    #[error("Commit rejected: {0}")]
    CommitRejected(String),

    #[error("{0} is a merge commit, replay it manually")]
    MergeCommit(String),
}

/// Errors from the rebuild workflow.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("Not on the {expected} branch (currently on {actual})")]
    WrongBranch { expected: String, actual: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{} is not a repository root", .0.display())]
    NotARepository(std::path::PathBuf),

    #[error("Uncommitted changes found, commit or stash them first")]
    UncommittedChanges,

    #[error("Nothing to do, base is already {0}")]
    NothingToDo(String),

    #[error("The {custom} base hasn't been found within {limit} commits, you need to specify the base revision")]
    BaseNotFound { custom: String, limit: usize },

    #[error("No commit to pick")]
    NoCommitsToReplay,

    #[error("Failed to commit, conflicts are probably left: {0}")]
    CommitFailed(#[source] VcsError),

    #[error("Nothing to abort, no rebuild in progress")]
    NothingToAbort,

    #[error("Failed to backup branch {name}: {source}")]
    BackupFailed {
        name: String,
        #[source]
        source: VcsError,
    },

    #[error("Failed to hard reset to {target}: {source}")]
    ResetFailed {
        target: String,
        #[source]
        source: VcsError,
    },

    #[error("Status file {} is corrupt: {message}", .path.display())]
    StatusCorrupt {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Interrupted, rebuild state saved; run again to resume")]
    Interrupted,

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("Status file I/O error at {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RebuildError {
    /// Process exit status for this error. `4` is reserved for conflicts.
    pub fn exit_code(&self) -> i32 {
        match self {
            RebuildError::InvalidArguments(_) => 2,
            RebuildError::WrongBranch { .. } => 3,
            RebuildError::NotARepository(_) => 5,
            RebuildError::UncommittedChanges => 6,
            RebuildError::NothingToDo(_) => 7,
            RebuildError::BaseNotFound { .. } => 8,
            RebuildError::NoCommitsToReplay => 9,
            RebuildError::CommitFailed(_) => 10,
            RebuildError::NothingToAbort => 11,
            RebuildError::BackupFailed { .. } => 12,
            RebuildError::ResetFailed { .. } => 13,
            RebuildError::StatusCorrupt { .. } => 14,
            RebuildError::Interrupted => 130,
            RebuildError::Vcs(_) | RebuildError::Io { .. } => 1,
        }
    }
}
