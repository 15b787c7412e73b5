use super::{DecoratedCommit, Decoration, ReplayOutcome, RevisionId, VcsBackend};
use crate::errors::VcsError;
use git2::{BranchType, Commit, Oid, Repository, ResetType, Signature, Sort, Status, StatusOptions};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// [`VcsBackend`] over a local repository, via libgit2.
pub struct GitBackend {
    repo: Repository,
}

impl GitBackend {
    /// Open the repository containing `repo_dir`, searching parent directories.
    pub fn open(repo_dir: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(repo_dir)?;
        Ok(Self { repo })
    }

    fn head_commit(&self) -> Result<Commit<'_>, VcsError> {
        Ok(self.repo.head()?.peel_to_commit()?)
    }

    fn find_commit(&self, rev: &RevisionId) -> Result<Commit<'_>, VcsError> {
        Oid::from_str(rev.as_str())
            .and_then(|oid| self.repo.find_commit(oid))
            .map_err(|_| VcsError::UnknownRevision(rev.to_string()))
    }

    fn fresh_index(&self) -> Result<git2::Index, VcsError> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }

    /// Map every commit that has local branches or tags pointing at it to those refs.
    fn decoration_index(&self) -> Result<HashMap<Oid, Vec<Decoration>>, VcsError> {
        let mut index: HashMap<Oid, Vec<Decoration>> = HashMap::new();

        for reference in self.repo.references()? {
            let reference = reference?;
            let decoration = match reference.name() {
                Some(name) => {
                    if let Some(branch) = name.strip_prefix("refs/heads/") {
                        Decoration::Branch(branch.to_string())
                    } else if let Some(tag) = name.strip_prefix("refs/tags/") {
                        Decoration::Tag(tag.to_string())
                    } else {
                        continue;
                    }
                }
                None => continue,
            };
            // Annotated tags peel through the tag object
            let Ok(commit) = reference.peel_to_commit() else {
                continue;
            };
            index.entry(commit.id()).or_default().push(decoration);
        }

        for decorations in index.values_mut() {
            decorations.sort();
        }
        Ok(index)
    }
}

impl VcsBackend for GitBackend {
    fn current_branch(&self) -> Result<String, VcsError> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().unwrap_or("HEAD").to_string())
        } else {
            Ok("HEAD".to_string())
        }
    }

    fn has_uncommitted_changes(&self) -> Result<bool, VcsError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let dirty = Status::WT_MODIFIED
            | Status::WT_DELETED
            | Status::WT_RENAMED
            | Status::WT_TYPECHANGE
            | Status::CONFLICTED;
        Ok(statuses.iter().any(|entry| entry.status().intersects(dirty)))
    }

    fn is_index_empty(&self) -> Result<bool, VcsError> {
        let index = self.fresh_index()?;
        if index.has_conflicts() {
            return Ok(false);
        }
        let head_tree = self.head_commit()?.tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(Some(&head_tree), Some(&index), None)?;
        Ok(diff.deltas().len() == 0)
    }

    fn head(&self) -> Result<RevisionId, VcsError> {
        Ok(self.head_commit()?.id().into())
    }

    fn resolve_revision(&self, expr: &str) -> Result<RevisionId, VcsError> {
        let commit = self
            .repo
            .revparse_single(expr)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| VcsError::UnknownRevision(expr.to_string()))?;
        Ok(commit.id().into())
    }

    fn log(&self, limit: usize) -> Result<Vec<DecoratedCommit>, VcsError> {
        let decorations = self.decoration_index()?;
        let mut walk = self.repo.revwalk()?;
        walk.push_head()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut entries = Vec::new();
        for oid in walk.take(limit) {
            let oid = oid?;
            entries.push(DecoratedCommit {
                id: oid.into(),
                decorations: decorations.get(&oid).cloned().unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    fn rev_list(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<RevisionId>, VcsError> {
        let from = self.find_commit(from)?.id();
        let to = self.find_commit(to)?.id();

        let mut walk = self.repo.revwalk()?;
        walk.push(to)?;
        walk.hide(from)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        walk.map(|oid| oid.map(RevisionId::from).map_err(VcsError::from))
            .collect()
    }

    fn head_decorations(&self) -> Result<Vec<Decoration>, VcsError> {
        let head = self.head_commit()?.id();
        Ok(self.decoration_index()?.remove(&head).unwrap_or_default())
    }

    fn branches(&self) -> Result<Vec<String>, VcsError> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        let head = self.head_commit()?;
        self.repo.branch(name, &head, false)?;
        debug!(branch = name, at = %head.id(), "created branch");
        Ok(())
    }

    fn hard_reset_to(&self, target: &str) -> Result<(), VcsError> {
        let object = self
            .repo
            .revparse_single(target)
            .map_err(|_| VcsError::UnknownRevision(target.to_string()))?;
        self.repo.reset(&object, ResetType::Hard, None)?;
        // Drops CHERRY_PICK_HEAD / MERGE_MSG left by a conflicted replay
        self.repo.cleanup_state()?;
        debug!(target, "hard reset");
        Ok(())
    }

    fn cherry_pick(&self, rev: &RevisionId) -> Result<ReplayOutcome, VcsError> {
        let picked = self.find_commit(rev)?;
        if picked.parent_count() > 1 {
            return Err(VcsError::MergeCommit(rev.to_string()));
        }
        let head = self.head_commit()?;

        self.repo.cherrypick(&picked, None)?;

        let mut index = self.fresh_index()?;
        if index.has_conflicts() {
            let mut paths = Vec::new();
            for conflict in index.conflicts()? {
                let conflict = conflict?;
                if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                    paths.push(String::from_utf8_lossy(&entry.path).into_owned());
                }
            }
            debug!(rev = %rev, ?paths, "cherry-pick conflicted");
            return Ok(ReplayOutcome::Conflict { paths });
        }

        let tree_id = index.write_tree()?;
        if tree_id == head.tree_id() {
            self.repo.cleanup_state()?;
            debug!(rev = %rev, "cherry-pick produced no changes");
            return Ok(ReplayOutcome::AlreadyApplied);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let committer = self.repo.signature()?;
        let message = picked.message().unwrap_or_default();
        let new_id = self.repo.commit(
            Some("HEAD"),
            &picked.author(),
            &committer,
            message,
            &tree,
            &[&head],
        )?;
        self.repo.cleanup_state()?;

        debug!(rev = %rev, new = %new_id, "cherry-picked");
        Ok(ReplayOutcome::Applied(new_id.into()))
    }

    fn commit_no_edit(&self) -> Result<RevisionId, VcsError> {
        let mut index = self.fresh_index()?;
        if index.has_conflicts() {
            return Err(VcsError::CommitRejected(
                "unmerged paths remain in the index".to_string(),
            ));
        }

        let prepared = self
            .repo
            .message()
            .map_err(|_| VcsError::CommitRejected("no prepared commit message".to_string()))?;
        let message = git2::message_prettify(prepared, Some(b'#'))?;
        if message.trim().is_empty() {
            return Err(VcsError::CommitRejected("empty commit message".to_string()));
        }

        let author: Signature<'static> = match self
            .repo
            .find_reference("CHERRY_PICK_HEAD")
            .and_then(|r| r.peel_to_commit())
        {
            Ok(picked) => picked.author().to_owned(),
            Err(_) => self.repo.signature()?,
        };
        let committer = self.repo.signature()?;

        let head = self.head_commit()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let new_id = self
            .repo
            .commit(Some("HEAD"), &author, &committer, &message, &tree, &[&head])?;
        self.repo.cleanup_state()?;

        debug!(new = %new_id, "committed staged changes");
        Ok(new_id.into())
    }

    fn one_line_summary(&self, rev: &RevisionId) -> Result<String, VcsError> {
        let commit = self.find_commit(rev)?;
        Ok(format!(
            "{} {}",
            rev.short(),
            commit.summary().unwrap_or_default()
        ))
    }
}
