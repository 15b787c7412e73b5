//! In-memory backend for unit tests.
//!
//! The current branch is modelled as a linear chain of commit ids, oldest
//! first. Replayed commits get a `'` suffix (`L1` becomes `L1'`).

use super::{DecoratedCommit, Decoration, ReplayOutcome, RevisionId, VcsBackend};
use crate::errors::VcsError;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct FakeState {
    pub branch: String,
    /// Current branch history, oldest first; HEAD is the last entry
    pub chain: Vec<String>,
    /// Branch name -> commit id (the current branch is implied by `chain`)
    pub branches: BTreeMap<String, String>,
    /// Branch name -> full history, used when resetting onto that branch
    pub branch_chains: HashMap<String, Vec<String>>,
    pub tags: BTreeMap<String, String>,
    pub dirty: bool,
    pub staged: bool,
    pub conflicting: HashSet<String>,
    /// Revisions the backend refuses to replay at all
    pub unreplayable: HashSet<String>,
    pub pending_pick: Option<String>,
    pub reject_commit: bool,
    pub reject_branch_creation: bool,
    pub picked: Vec<String>,
    pub created_branches: Vec<String>,
    pub resets: Vec<String>,
    pub commits_made: usize,
}

pub struct FakeBackend {
    pub state: RefCell<FakeState>,
}

impl FakeBackend {
    pub fn new(branch: &str, chain: &[&str]) -> Self {
        let state = FakeState {
            branch: branch.to_string(),
            chain: chain.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    /// Point `name` at `commit`; `history` is what a reset onto it produces.
    pub fn with_branch(self, name: &str, history: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let chain: Vec<String> = history.iter().map(|c| c.to_string()).collect();
            if let Some(tip) = chain.last() {
                state.branches.insert(name.to_string(), tip.clone());
            }
            state.branch_chains.insert(name.to_string(), chain);
        }
        self
    }

    pub fn with_tag(self, name: &str, commit: &str) -> Self {
        self.state
            .borrow_mut()
            .tags
            .insert(name.to_string(), commit.to_string());
        self
    }

    pub fn with_conflict_on(self, rev: &str) -> Self {
        self.state.borrow_mut().conflicting.insert(rev.to_string());
        self
    }

    pub fn with_merge_at(self, rev: &str) -> Self {
        self.state.borrow_mut().unreplayable.insert(rev.to_string());
        self
    }

    fn decorations_of(state: &FakeState, commit: &str) -> Vec<Decoration> {
        let mut decorations = Vec::new();
        if state.chain.last().map(String::as_str) == Some(commit) {
            decorations.push(Decoration::Branch(state.branch.clone()));
        }
        for (name, tip) in &state.branches {
            if tip == commit && name != &state.branch {
                decorations.push(Decoration::Branch(name.clone()));
            }
        }
        for (name, tip) in &state.tags {
            if tip == commit {
                decorations.push(Decoration::Tag(name.clone()));
            }
        }
        decorations.sort();
        decorations
    }

    fn position(state: &FakeState, rev: &RevisionId) -> Result<usize, VcsError> {
        state
            .chain
            .iter()
            .position(|c| c == rev.as_str())
            .ok_or_else(|| VcsError::UnknownRevision(rev.to_string()))
    }
}

impl VcsBackend for FakeBackend {
    fn current_branch(&self) -> Result<String, VcsError> {
        Ok(self.state.borrow().branch.clone())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, VcsError> {
        Ok(self.state.borrow().dirty)
    }

    fn is_index_empty(&self) -> Result<bool, VcsError> {
        Ok(!self.state.borrow().staged)
    }

    fn head(&self) -> Result<RevisionId, VcsError> {
        let state = self.state.borrow();
        state
            .chain
            .last()
            .map(RevisionId::new)
            .ok_or_else(|| VcsError::UnknownRevision("HEAD".to_string()))
    }

    fn resolve_revision(&self, expr: &str) -> Result<RevisionId, VcsError> {
        let state = self.state.borrow();
        if let Some(tip) = state.branches.get(expr) {
            return Ok(RevisionId::new(tip.clone()));
        }
        if state.chain.iter().any(|c| c == expr) {
            return Ok(RevisionId::new(expr));
        }
        Err(VcsError::UnknownRevision(expr.to_string()))
    }

    fn log(&self, limit: usize) -> Result<Vec<DecoratedCommit>, VcsError> {
        let state = self.state.borrow();
        Ok(state
            .chain
            .iter()
            .rev()
            .take(limit)
            .map(|c| DecoratedCommit {
                id: RevisionId::new(c.clone()),
                decorations: Self::decorations_of(&state, c),
            })
            .collect())
    }

    fn rev_list(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<RevisionId>, VcsError> {
        let state = self.state.borrow();
        let start = Self::position(&state, from)?;
        let end = Self::position(&state, to)?;
        if end <= start {
            return Ok(Vec::new());
        }
        Ok(state.chain[start + 1..=end]
            .iter()
            .rev()
            .map(|c| RevisionId::new(c.clone()))
            .collect())
    }

    fn head_decorations(&self) -> Result<Vec<Decoration>, VcsError> {
        let state = self.state.borrow();
        Ok(match state.chain.last() {
            Some(head) => Self::decorations_of(&state, head),
            None => Vec::new(),
        })
    }

    fn branches(&self) -> Result<Vec<String>, VcsError> {
        let state = self.state.borrow();
        let mut names: Vec<String> = state.branches.keys().cloned().collect();
        if !names.contains(&state.branch) {
            names.push(state.branch.clone());
        }
        Ok(names)
    }

    fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        if state.reject_branch_creation || state.branches.contains_key(name) {
            return Err(VcsError::CommitRejected(format!(
                "cannot create branch {}",
                name
            )));
        }
        let head = state.chain.last().cloned().unwrap_or_default();
        let chain = state.chain.clone();
        state.branches.insert(name.to_string(), head);
        state.branch_chains.insert(name.to_string(), chain);
        state.created_branches.push(name.to_string());
        Ok(())
    }

    fn hard_reset_to(&self, target: &str) -> Result<(), VcsError> {
        let mut state = self.state.borrow_mut();
        let chain = state
            .branch_chains
            .get(target)
            .cloned()
            .ok_or_else(|| VcsError::UnknownRevision(target.to_string()))?;
        state.chain = chain;
        state.staged = false;
        state.pending_pick = None;
        state.resets.push(target.to_string());
        Ok(())
    }

    fn cherry_pick(&self, rev: &RevisionId) -> Result<ReplayOutcome, VcsError> {
        let mut state = self.state.borrow_mut();
        if state.unreplayable.contains(rev.as_str()) {
            return Err(VcsError::MergeCommit(rev.to_string()));
        }
        if state.conflicting.contains(rev.as_str()) {
            state.staged = true;
            state.pending_pick = Some(rev.to_string());
            return Ok(ReplayOutcome::Conflict {
                paths: vec!["conflicted.txt".to_string()],
            });
        }
        let replayed = format!("{}'", rev);
        state.chain.push(replayed.clone());
        state.picked.push(rev.to_string());
        Ok(ReplayOutcome::Applied(RevisionId::new(replayed)))
    }

    fn commit_no_edit(&self) -> Result<RevisionId, VcsError> {
        let mut state = self.state.borrow_mut();
        if state.reject_commit {
            return Err(VcsError::CommitRejected(
                "unmerged paths remain in the index".to_string(),
            ));
        }
        let base = state
            .pending_pick
            .take()
            .unwrap_or_else(|| "staged".to_string());
        let id = format!("{}'", base);
        state.chain.push(id.clone());
        state.staged = false;
        state.commits_made += 1;
        Ok(RevisionId::new(id))
    }

    fn one_line_summary(&self, rev: &RevisionId) -> Result<String, VcsError> {
        Ok(format!("{} commit {}", rev.short(), rev))
    }
}
