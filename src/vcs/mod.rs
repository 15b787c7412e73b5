//! Version-control backend abstraction.
//!
//! The rebuild workflow never talks to git directly: the resolver, the backup
//! manager and the controller all go through [`VcsBackend`], so tests can
//! substitute an in-memory backend.

mod git;

#[cfg(test)]
pub(crate) mod fake;

pub use git::GitBackend;

use crate::errors::VcsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque commit identifier. Ordering only comes from history traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<git2::Oid> for RevisionId {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// A ref attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Decoration {
    /// Local branch, by short name
    Branch(String),
    /// Tag, by short name
    Tag(String),
}

impl fmt::Display for Decoration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoration::Branch(name) => f.write_str(name),
            Decoration::Tag(name) => write!(f, "tag: {}", name),
        }
    }
}

/// One history entry with the refs pointing at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedCommit {
    pub id: RevisionId,
    pub decorations: Vec<Decoration>,
}

/// Result of replaying a single commit onto HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// A new commit was created on top of HEAD
    Applied(RevisionId),
    /// The change is already present, nothing was committed
    AlreadyApplied,
    /// The replay stopped with conflicts; the repository is left mid-replay
    Conflict { paths: Vec<String> },
}

/// Atomic operations against the repository.
pub trait VcsBackend {
    /// Name of the checked out branch, `"HEAD"` when detached.
    fn current_branch(&self) -> Result<String, VcsError>;

    /// Whether tracked files are modified in the working tree.
    fn has_uncommitted_changes(&self) -> Result<bool, VcsError>;

    /// Whether the index matches HEAD.
    fn is_index_empty(&self) -> Result<bool, VcsError>;

    /// The commit HEAD points at.
    fn head(&self) -> Result<RevisionId, VcsError>;

    /// Resolve a user supplied revision expression to a commit.
    fn resolve_revision(&self, expr: &str) -> Result<RevisionId, VcsError>;

    /// Up to `limit` history entries from HEAD, newest first, with decorations.
    fn log(&self, limit: usize) -> Result<Vec<DecoratedCommit>, VcsError>;

    /// Commits reachable from `to` but not from `from`, newest first.
    fn rev_list(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<RevisionId>, VcsError>;

    /// Refs attached to HEAD.
    fn head_decorations(&self) -> Result<Vec<Decoration>, VcsError>;

    /// All local branch names.
    fn branches(&self) -> Result<Vec<String>, VcsError>;

    /// Create a branch at HEAD. Fails if it already exists.
    fn create_branch(&self, name: &str) -> Result<(), VcsError>;

    /// Move the checked out branch, index and working tree to `target`.
    fn hard_reset_to(&self, target: &str) -> Result<(), VcsError>;

    /// Replay `rev` onto HEAD.
    fn cherry_pick(&self, rev: &RevisionId) -> Result<ReplayOutcome, VcsError>;

    /// Commit the index with the prepared message, without editing it.
    fn commit_no_edit(&self) -> Result<RevisionId, VcsError>;

    /// `"<short id> <summary>"` for display.
    fn one_line_summary(&self, rev: &RevisionId) -> Result<String, VcsError>;
}
