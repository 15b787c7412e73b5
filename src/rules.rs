//! Matching rules for branch and tag decorations.
//!
//! Kept apart from the backend so the naming conventions can be tested on
//! plain [`Decoration`] values:
//! - the custom branch marker (exact name)
//! - custom backup branches: `^<custom_backup_prefix>(\d*)$`
//! - custom tags: `^<custom_tag_pattern>$`
//! - light backup branches: `^<light_backup_prefix>(\d*)$`, an empty suffix counts as 0

use crate::config::Config;
use crate::vcs::Decoration;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which decoration identified the custom base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseLabel {
    /// The custom branch itself
    CustomBranch(String),
    /// A custom backup branch
    CustomBackup(String),
    /// A custom tag
    CustomTag(String),
}

impl BaseLabel {
    pub fn is_custom_branch(&self) -> bool {
        matches!(self, BaseLabel::CustomBranch(_))
    }
}

impl fmt::Display for BaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseLabel::CustomBranch(name) | BaseLabel::CustomBackup(name) => f.write_str(name),
            BaseLabel::CustomTag(name) => write!(f, "tag: {}", name),
        }
    }
}

/// Name of a light backup branch: prefix plus numeric suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupBranchName(String);

impl BackupBranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupBranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Naming scheme of light backup branches.
#[derive(Debug, Clone)]
pub struct BackupNaming {
    prefix: String,
    pattern: Regex,
}

impl BackupNaming {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"^{}(\d*)$", regex::escape(prefix)))
            .context("Failed to build backup branch pattern")?;
        Ok(Self {
            prefix: prefix.to_string(),
            pattern,
        })
    }

    /// Suffix of `name` if it is a backup branch name.
    pub fn suffix_of(&self, name: &str) -> Option<u64> {
        let caps = self.pattern.captures(name)?;
        let digits = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if digits.is_empty() {
            Some(0)
        } else {
            // Suffixes too large for u64 are not ours
            digits.parse().ok()
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.suffix_of(name).is_some()
    }

    /// Wrap an existing branch name, if it follows the scheme.
    pub fn parse(&self, name: &str) -> Option<BackupBranchName> {
        self.matches(name)
            .then(|| BackupBranchName(name.to_string()))
    }

    pub fn name_with_suffix(&self, suffix: u64) -> BackupBranchName {
        BackupBranchName(format!("{}{}", self.prefix, suffix))
    }

    /// `max(existing suffixes) + 1`, or 1 when no backup branch exists.
    pub fn next_name<'a>(&self, branches: impl IntoIterator<Item = &'a str>) -> BackupBranchName {
        let next = branches
            .into_iter()
            .filter_map(|name| self.suffix_of(name))
            .max()
            .map_or(1, |max| max + 1);
        self.name_with_suffix(next)
    }
}

/// All decoration rules used by the resolver and the backup manager.
#[derive(Debug, Clone)]
pub struct DecorationRules {
    custom_branch: String,
    custom_backup: Regex,
    custom_tag: Regex,
    light_backup: BackupNaming,
}

impl DecorationRules {
    pub fn new(
        custom_branch: &str,
        custom_backup_prefix: &str,
        custom_tag_pattern: &str,
        light_backup_prefix: &str,
    ) -> Result<Self> {
        let custom_backup = Regex::new(&format!(r"^{}\d*$", regex::escape(custom_backup_prefix)))
            .context("Failed to build custom backup pattern")?;
        let custom_tag = Regex::new(&format!("^(?:{})$", custom_tag_pattern))
            .with_context(|| format!("Invalid custom_tag_pattern '{}'", custom_tag_pattern))?;
        Ok(Self {
            custom_branch: custom_branch.to_string(),
            custom_backup,
            custom_tag,
            light_backup: BackupNaming::new(light_backup_prefix)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.custom_branch,
            &config.custom_backup_prefix,
            &config.custom_tag_pattern,
            &config.light_backup_prefix,
        )
    }

    pub fn light_backup(&self) -> &BackupNaming {
        &self.light_backup
    }

    /// The label marking `decorations` as a custom base, if any.
    ///
    /// The custom branch wins over backups and tags on the same commit;
    /// otherwise the first matching decoration is used.
    pub fn match_base(&self, decorations: &[Decoration]) -> Option<BaseLabel> {
        let is_custom = decorations
            .iter()
            .any(|d| matches!(d, Decoration::Branch(name) if *name == self.custom_branch));
        if is_custom {
            return Some(BaseLabel::CustomBranch(self.custom_branch.clone()));
        }

        decorations.iter().find_map(|decoration| match decoration {
            Decoration::Branch(name) if self.custom_backup.is_match(name) => {
                Some(BaseLabel::CustomBackup(name.clone()))
            }
            Decoration::Tag(name) if self.custom_tag.is_match(name) => {
                Some(BaseLabel::CustomTag(name.clone()))
            }
            _ => None,
        })
    }

    /// The light backup branch among `decorations`, if any.
    pub fn find_light_backup(&self, decorations: &[Decoration]) -> Option<BackupBranchName> {
        decorations.iter().find_map(|decoration| match decoration {
            Decoration::Branch(name) => self.light_backup.parse(name),
            Decoration::Tag(_) => None,
        })
    }
}
