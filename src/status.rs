//! Rebuild checkpoint persistence.
//!
//! The checkpoint file exists only while a rebuild is in progress; its
//! presence is the in-progress marker.

use crate::errors::RebuildError;
use crate::resolver::RevisionQueue;
use crate::rules::BackupBranchName;
use crate::vcs::RevisionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Current checkpoint schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Snapshot of an in-flight rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildCheckpoint {
    pub version: u32,
    pub revisions_remaining: RevisionQueue,
    pub backup_branch: BackupBranchName,
    /// The front revision stopped on a conflict that awaits manual resolution
    #[serde(default)]
    pub conflicted: bool,
    /// HEAD when the replay stopped, used to tell a committed fix from an abandoned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<RevisionId>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RebuildCheckpoint {
    pub fn new(revisions_remaining: RevisionQueue, backup_branch: BackupBranchName) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            revisions_remaining,
            backup_branch,
            conflicted: false,
            stopped_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn front(&self) -> Option<&RevisionId> {
        self.revisions_remaining.front()
    }

    /// Checkpoint after the front revision has been replayed.
    pub fn advanced(&self) -> Self {
        Self {
            revisions_remaining: self.revisions_remaining.without_front(),
            conflicted: false,
            stopped_at: None,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Checkpoint recording that the front revision failed to replay onto `head`.
    pub fn with_conflict(&self, head: RevisionId) -> Self {
        Self {
            conflicted: true,
            stopped_at: Some(head),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Same queue, with the front to be replayed again.
    pub fn retried(&self) -> Self {
        Self {
            conflicted: false,
            stopped_at: None,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

pub struct StatusStore {
    status_file: PathBuf,
}

impl StatusStore {
    pub fn new(status_file: PathBuf) -> Self {
        Self { status_file }
    }

    pub fn path(&self) -> &Path {
        &self.status_file
    }

    pub fn exists(&self) -> bool {
        self.status_file.exists()
    }

    /// Load the checkpoint; `None` when no rebuild is in progress.
    pub fn load(&self) -> Result<Option<RebuildCheckpoint>, RebuildError> {
        let content = match fs::read_to_string(&self.status_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RebuildError::Io {
                    path: self.status_file.clone(),
                    source,
                });
            }
        };

        let checkpoint: RebuildCheckpoint =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;

        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {} (expected {})",
                checkpoint.version, CHECKPOINT_VERSION
            )));
        }

        debug!(
            remaining = checkpoint.revisions_remaining.len(),
            backup = %checkpoint.backup_branch,
            "loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    /// Replace any previous checkpoint.
    pub fn save(&self, checkpoint: &RebuildCheckpoint) -> Result<(), RebuildError> {
        let content = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| self.corrupt(e.to_string()))?;

        let tmp_file = self.status_file.with_extension("tmp");
        fs::write(&tmp_file, content).map_err(|source| RebuildError::Io {
            path: tmp_file.clone(),
            source,
        })?;
        fs::rename(&tmp_file, &self.status_file).map_err(|source| RebuildError::Io {
            path: self.status_file.clone(),
            source,
        })?;

        debug!(
            remaining = checkpoint.revisions_remaining.len(),
            conflicted = checkpoint.conflicted,
            "saved checkpoint"
        );
        Ok(())
    }

    /// Remove the checkpoint. Clearing an absent checkpoint is fine.
    pub fn clear(&self) -> Result<(), RebuildError> {
        match fs::remove_file(&self.status_file) {
            Ok(()) => {
                debug!("cleared checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RebuildError::Io {
                path: self.status_file.clone(),
                source,
            }),
        }
    }

    fn corrupt(&self, message: String) -> RebuildError {
        RebuildError::StatusCorrupt {
            path: self.status_file.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::BackupNaming;
    use tempfile::tempdir;

    fn make_store() -> (StatusStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("light_rebuild.status");
        (StatusStore::new(path), dir)
    }

    fn checkpoint(revs: &[&str]) -> RebuildCheckpoint {
        let queue = RevisionQueue::new(revs.iter().map(|r| RevisionId::new(*r)).collect());
        let backup = BackupNaming::new("light_backup").unwrap().name_with_suffix(2);
        RebuildCheckpoint::new(queue, backup)
    }

    #[test]
    fn test_load_absent_returns_none() {
        let (store, _dir) = make_store();
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _dir) = make_store();
        let saved = checkpoint(&["c3", "c4"]);
        store.save(&saved).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.revisions_remaining, saved.revisions_remaining);
        assert_eq!(loaded.backup_branch, saved.backup_branch);
        assert!(!loaded.conflicted);
    }

    #[test]
    fn test_save_overwrites_previous_checkpoint() {
        let (store, dir) = make_store();
        store.save(&checkpoint(&["a", "b", "c"])).unwrap();
        store.save(&checkpoint(&["c"])).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.revisions_remaining.len(), 1);
        assert!(!dir.path().join("light_rebuild.tmp").exists());
    }

    #[test]
    fn test_recovery_after_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("light_rebuild.status");

        {
            let store = StatusStore::new(path.clone());
            store
                .save(&checkpoint(&["x"]).with_conflict(RevisionId::new("h1")))
                .unwrap();
        }

        {
            let store = StatusStore::new(path);
            let loaded = store.load().unwrap().unwrap();
            assert!(loaded.conflicted);
            assert_eq!(loaded.stopped_at, Some(RevisionId::new("h1")));
            assert_eq!(loaded.front().unwrap().as_str(), "x");
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, _dir) = make_store();
        store.save(&checkpoint(&["a"])).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_malformed_content_is_corrupt() {
        let (store, _dir) = make_store();
        fs::write(store.path(), "revs_to_go: [abc]").unwrap();
        assert!(matches!(
            store.load(),
            Err(RebuildError::StatusCorrupt { .. })
        ));
    }

    #[test]
    fn test_missing_required_field_is_corrupt() {
        let (store, _dir) = make_store();
        fs::write(
            store.path(),
            r#"{"version": 1, "revisions_remaining": ["abc"]}"#,
        )
        .unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, RebuildError::StatusCorrupt { .. }));
        assert!(err.to_string().contains("backup_branch"));
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let (store, _dir) = make_store();
        fs::write(
            store.path(),
            r#"{"version": 9, "revisions_remaining": [], "backup_branch": "light_backup1"}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load(),
            Err(RebuildError::StatusCorrupt { .. })
        ));
    }

    #[test]
    fn test_optional_fields_default() {
        let (store, _dir) = make_store();
        fs::write(
            store.path(),
            r#"{"version": 1, "revisions_remaining": ["a"], "backup_branch": "light_backup1"}"#,
        )
        .unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert!(!loaded.conflicted);
        assert!(loaded.stopped_at.is_none());
        assert_eq!(loaded.backup_branch.as_str(), "light_backup1");
    }

    #[test]
    fn test_advanced_drops_front_and_clears_conflict() {
        let cp = checkpoint(&["a", "b"]).with_conflict(RevisionId::new("h1"));
        let next = cp.advanced();
        assert_eq!(next.front().unwrap().as_str(), "b");
        assert!(!next.conflicted);
        assert!(next.stopped_at.is_none());
        assert_eq!(next.backup_branch, cp.backup_branch);
        // The original value is untouched
        assert_eq!(cp.revisions_remaining.len(), 2);
        assert!(cp.conflicted);
    }

    #[test]
    fn test_retried_keeps_front() {
        let cp = checkpoint(&["a", "b"]).with_conflict(RevisionId::new("h1"));
        let retry = cp.retried();
        assert_eq!(retry.front().unwrap().as_str(), "a");
        assert_eq!(retry.revisions_remaining.len(), 2);
        assert!(!retry.conflicted);
        assert!(retry.stopped_at.is_none());
    }
}
