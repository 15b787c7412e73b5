//! Configuration for light-rebuild.
//!
//! Settings are read from an optional `.light-rebuild.toml` at the repository
//! root, then overridden by environment variables and CLI arguments.
//!
//! # Configuration File Format
//!
//! ```toml
//! [branches]
//! light = "light"
//! custom = "custom"
//! light_backup_prefix = "light_backup"
//! custom_backup_prefix = "custom_backup"
//! custom_tag_pattern = "custom-[\\w.-]+"
//!
//! [rebuild]
//! lookback_limit = 100
//! status_file = "light_rebuild.status"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional configuration file at the repository root.
pub const CONFIG_FILE_NAME: &str = ".light-rebuild.toml";

/// Environment variable overriding `branches.light`.
pub const LIGHT_BRANCH_ENV: &str = "LIGHT_REBUILD_BRANCH";

/// Environment variable overriding `branches.custom`.
pub const CUSTOM_BRANCH_ENV: &str = "LIGHT_REBUILD_CUSTOM_BRANCH";

/// Branch and tag naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchesSection {
    /// The working branch the rebuild operates on
    #[serde(default = "default_light")]
    pub light: String,
    /// The custom/integration branch commits are replayed onto
    #[serde(default = "default_custom")]
    pub custom: String,
    /// Prefix of light backup branches (`light_backup1`, `light_backup2`, ...)
    #[serde(default = "default_light_backup_prefix")]
    pub light_backup_prefix: String,
    /// Prefix of custom backup branches, which mark an older custom base
    #[serde(default = "default_custom_backup_prefix")]
    pub custom_backup_prefix: String,
    /// Regex (anchored on both ends) for tags marking a custom base
    #[serde(default = "default_custom_tag_pattern")]
    pub custom_tag_pattern: String,
}

fn default_light() -> String {
    "light".to_string()
}

fn default_custom() -> String {
    "custom".to_string()
}

fn default_light_backup_prefix() -> String {
    "light_backup".to_string()
}

fn default_custom_backup_prefix() -> String {
    "custom_backup".to_string()
}

fn default_custom_tag_pattern() -> String {
    r"custom-[\w.-]+".to_string()
}

impl Default for BranchesSection {
    fn default() -> Self {
        Self {
            light: default_light(),
            custom: default_custom(),
            light_backup_prefix: default_light_backup_prefix(),
            custom_backup_prefix: default_custom_backup_prefix(),
            custom_tag_pattern: default_custom_tag_pattern(),
        }
    }
}

/// Rebuild behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildSection {
    /// Maximum number of history entries scanned for the custom base
    #[serde(default = "default_lookback_limit")]
    pub lookback_limit: usize,
    /// Checkpoint file name, relative to the repository root
    #[serde(default = "default_status_file")]
    pub status_file: String,
}

fn default_lookback_limit() -> usize {
    100
}

fn default_status_file() -> String {
    "light_rebuild.status".to_string()
}

impl Default for RebuildSection {
    fn default() -> Self {
        Self {
            lookback_limit: default_lookback_limit(),
            status_file: default_status_file(),
        }
    }
}

/// The complete `.light-rebuild.toml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildToml {
    #[serde(default)]
    pub branches: BranchesSection,
    #[serde(default)]
    pub rebuild: RebuildSection,
}

impl RebuildToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| format!("Failed to parse {}", CONFIG_FILE_NAME))
    }

    /// Load `.light-rebuild.toml` from the repository root.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(repo_dir: &Path) -> Result<Self> {
        let config_path = repo_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| format!("Failed to serialize {}", CONFIG_FILE_NAME))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Light branch name, environment overrides the file.
    pub fn light_branch(&self) -> String {
        std::env::var(LIGHT_BRANCH_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.branches.light.clone())
    }

    /// Custom branch name, environment overrides the file.
    pub fn custom_branch(&self) -> String {
        std::env::var(CUSTOM_BRANCH_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.branches.custom.clone())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let names = [
            ("branches.light", &self.branches.light),
            ("branches.custom", &self.branches.custom),
            ("branches.light_backup_prefix", &self.branches.light_backup_prefix),
            ("branches.custom_backup_prefix", &self.branches.custom_backup_prefix),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                warnings.push(format!("{} must not be empty", key));
            }
        }

        if self.branches.light_backup_prefix == self.branches.light {
            warnings.push(format!(
                "branches.light_backup_prefix '{}' equals the light branch name",
                self.branches.light_backup_prefix
            ));
        }

        if let Err(e) = regex::Regex::new(&self.branches.custom_tag_pattern) {
            warnings.push(format!(
                "Invalid custom_tag_pattern '{}': {}",
                self.branches.custom_tag_pattern, e
            ));
        }

        if self.rebuild.lookback_limit == 0 {
            warnings.push("rebuild.lookback_limit must be greater than 0".to_string());
        }

        if self.rebuild.status_file.trim().is_empty() {
            warnings.push("rebuild.status_file must not be empty".to_string());
        }

        warnings
    }
}

/// Runtime configuration: the TOML file merged with environment and CLI overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo_dir: PathBuf,
    pub status_file: PathBuf,
    pub light_branch: String,
    pub custom_branch: String,
    pub light_backup_prefix: String,
    pub custom_backup_prefix: String,
    pub custom_tag_pattern: String,
    pub lookback_limit: usize,
    toml: RebuildToml,
}

impl Config {
    /// Build the runtime configuration for the repository rooted at `repo_dir`.
    pub fn new(repo_dir: PathBuf) -> Result<Self> {
        let repo_dir = repo_dir
            .canonicalize()
            .context("Failed to resolve repository directory")?;
        let toml = RebuildToml::load_or_default(&repo_dir)?;
        Ok(Self::from_toml(repo_dir, toml))
    }

    /// Build the runtime configuration from an already parsed file.
    pub fn from_toml(repo_dir: PathBuf, toml: RebuildToml) -> Self {
        let status_file = repo_dir.join(&toml.rebuild.status_file);
        Self {
            status_file,
            light_branch: toml.light_branch(),
            custom_branch: toml.custom_branch(),
            light_backup_prefix: toml.branches.light_backup_prefix.clone(),
            custom_backup_prefix: toml.branches.custom_backup_prefix.clone(),
            custom_tag_pattern: toml.branches.custom_tag_pattern.clone(),
            lookback_limit: toml.rebuild.lookback_limit,
            repo_dir,
            toml,
        }
    }

    /// The parsed file this configuration was built from.
    pub fn toml(&self) -> &RebuildToml {
        &self.toml
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
