//! Revision resolution: where the light commits start and which ones to replay.

use crate::errors::VcsError;
use crate::rules::{BaseLabel, DecorationRules};
use crate::vcs::{RevisionId, VcsBackend};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Commits to replay, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionQueue(Vec<RevisionId>);

impl RevisionQueue {
    pub fn new(revisions: Vec<RevisionId>) -> Self {
        Self(revisions)
    }

    pub fn front(&self) -> Option<&RevisionId> {
        self.0.first()
    }

    /// The queue minus its front entry.
    pub fn without_front(&self) -> Self {
        Self(self.0.iter().skip(1).cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RevisionId> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a RevisionQueue {
    type Item = &'a RevisionId;
    type IntoIter = std::slice::Iter<'a, RevisionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The commit the light branch was built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBase {
    pub id: RevisionId,
    pub label: BaseLabel,
}

/// Outcome of scanning history for the custom base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseLookup {
    Found(ResolvedBase),
    /// No marker within the lookback limit (or before the root commit)
    NotFound { scanned: usize },
}

pub struct RevisionResolver<'a, B: VcsBackend + ?Sized> {
    backend: &'a B,
    rules: &'a DecorationRules,
    lookback_limit: usize,
}

impl<'a, B: VcsBackend + ?Sized> RevisionResolver<'a, B> {
    pub fn new(backend: &'a B, rules: &'a DecorationRules, lookback_limit: usize) -> Self {
        Self {
            backend,
            rules,
            lookback_limit,
        }
    }

    /// Walk back from HEAD to the first commit decorated as a custom base.
    pub fn resolve_base(&self) -> Result<BaseLookup, VcsError> {
        let history = self.backend.log(self.lookback_limit)?;
        let scanned = history.len();

        for entry in history {
            if let Some(label) = self.rules.match_base(&entry.decorations) {
                debug!(base = %entry.id, %label, "resolved custom base");
                return Ok(BaseLookup::Found(ResolvedBase {
                    id: entry.id,
                    label,
                }));
            }
        }

        debug!(scanned, "custom base not found");
        Ok(BaseLookup::NotFound { scanned })
    }

    /// Commits after `from` up to and including `to`, oldest first.
    pub fn list_revisions(
        &self,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<RevisionQueue, VcsError> {
        let mut revisions = self.backend.rev_list(from, to)?;
        revisions.reverse();
        Ok(RevisionQueue::new(revisions))
    }

    /// Commits after an operator supplied base up to HEAD.
    pub fn list_revisions_from(&self, base: &str) -> Result<RevisionQueue, VcsError> {
        let from = self.backend.resolve_revision(base)?;
        let head = self.backend.head()?;
        self.list_revisions(&from, &head)
    }

    /// Commits after the automatically resolved base up to HEAD, `None` if no base was found.
    pub fn light_revisions(&self) -> Result<Option<RevisionQueue>, VcsError> {
        match self.resolve_base()? {
            BaseLookup::Found(base) => {
                let head = self.backend.head()?;
                self.list_revisions(&base.id, &head).map(Some)
            }
            BaseLookup::NotFound { .. } => Ok(None),
        }
    }

    /// Whether the light branch already sits directly on the custom branch.
    pub fn is_base_already_custom(&self) -> Result<bool, VcsError> {
        Ok(matches!(
            self.resolve_base()?,
            BaseLookup::Found(ResolvedBase { label, .. }) if label.is_custom_branch()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::fake::FakeBackend;

    fn rules() -> DecorationRules {
        DecorationRules::new("custom", "custom_backup", r"custom-[\w.-]+", "light_backup").unwrap()
    }

    fn ids(queue: &RevisionQueue) -> Vec<&str> {
        queue.iter().map(|r| r.as_str()).collect()
    }

    #[test]
    fn test_resolve_base_finds_custom_backup_decoration() {
        // A -> B -> C -> HEAD, B carries the custom backup branch
        let backend = FakeBackend::new("light", &["A", "B", "C", "H"])
            .with_branch("custom_backup1", &["A", "B"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);

        let lookup = resolver.resolve_base().unwrap();
        assert_eq!(
            lookup,
            BaseLookup::Found(ResolvedBase {
                id: RevisionId::new("B"),
                label: BaseLabel::CustomBackup("custom_backup1".into()),
            })
        );

        let queue = resolver
            .list_revisions(&RevisionId::new("B"), &RevisionId::new("H"))
            .unwrap();
        assert_eq!(ids(&queue), vec!["C", "H"]);
        assert!(!resolver.is_base_already_custom().unwrap());
    }

    #[test]
    fn test_resolve_base_finds_custom_tag() {
        let backend = FakeBackend::new("light", &["A", "B", "C"]).with_tag("custom-3.0", "A");
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);

        match resolver.resolve_base().unwrap() {
            BaseLookup::Found(base) => {
                assert_eq!(base.id.as_str(), "A");
                assert_eq!(base.label, BaseLabel::CustomTag("custom-3.0".into()));
            }
            other => panic!("Expected Found, got {:?}", other),
        }
        assert_eq!(
            ids(&resolver.light_revisions().unwrap().unwrap()),
            vec!["B", "C"]
        );
    }

    #[test]
    fn test_nearest_base_wins() {
        let backend = FakeBackend::new("light", &["A", "B", "C", "D"])
            .with_tag("custom-1.0", "A")
            .with_branch("custom_backup2", &["A", "B", "C"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);
        assert_eq!(ids(&resolver.light_revisions().unwrap().unwrap()), vec!["D"]);
    }

    #[test]
    fn test_base_already_custom() {
        let backend =
            FakeBackend::new("light", &["A", "B", "C"]).with_branch("custom", &["A", "B"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);
        assert!(resolver.is_base_already_custom().unwrap());
    }

    #[test]
    fn test_base_not_found_within_lookback_limit() {
        let backend =
            FakeBackend::new("light", &["A", "B", "C", "D"]).with_branch("custom_backup1", &["A"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 3);

        assert_eq!(
            resolver.resolve_base().unwrap(),
            BaseLookup::NotFound { scanned: 3 }
        );
        assert!(resolver.light_revisions().unwrap().is_none());
        assert!(!resolver.is_base_already_custom().unwrap());

        // The same history is found with a larger limit
        let resolver = RevisionResolver::new(&backend, &rules, 4);
        assert!(matches!(resolver.resolve_base().unwrap(), BaseLookup::Found(_)));
    }

    #[test]
    fn test_list_revisions_reverses_newest_first_history() {
        let backend = FakeBackend::new("light", &["A", "B", "C", "D", "E"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);

        let from = RevisionId::new("A");
        let to = RevisionId::new("E");
        let mut newest_first = backend.rev_list(&from, &to).unwrap();
        newest_first.reverse();

        let queue = resolver.list_revisions(&from, &to).unwrap();
        assert_eq!(queue, RevisionQueue::new(newest_first));
        assert_eq!(ids(&queue), vec!["B", "C", "D", "E"]);
    }

    #[test]
    fn test_list_revisions_from_explicit_base() {
        let backend = FakeBackend::new("light", &["A", "B", "C"]);
        let rules = rules();
        let resolver = RevisionResolver::new(&backend, &rules, 100);
        assert_eq!(ids(&resolver.list_revisions_from("A").unwrap()), vec!["B", "C"]);
        assert!(resolver.list_revisions_from("C").unwrap().is_empty());
        assert!(matches!(
            resolver.list_revisions_from("nope"),
            Err(VcsError::UnknownRevision(_))
        ));
    }

    #[test]
    fn test_queue_without_front_leaves_original_untouched() {
        let queue = RevisionQueue::new(vec![RevisionId::new("a"), RevisionId::new("b")]);
        let rest = queue.without_front();
        assert_eq!(ids(&rest), vec!["b"]);
        assert_eq!(queue.len(), 2);
        assert!(rest.without_front().is_empty());
        assert!(RevisionQueue::default().without_front().is_empty());
    }
}
