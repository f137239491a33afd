//! Repository configuration.
//!
//! Configuration lives in `.trellis/config.yaml` at the repository root:
//!
//! ```yaml
//! tickets-dir: .trellis/tickets
//! strict-links: false
//! auto-commit: false
//! branch-prefix: ''
//! ```
//!
//! Every key is optional.

use crate::error::{ConfigError, Result};
use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Name of the trellis directory
pub const TRELLIS_DIR_NAME: &str = ".trellis";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default ticket directory, relative to the repository root
pub const DEFAULT_TICKETS_DIR: &str = ".trellis/tickets";

/// Maximum directory depth to traverse when searching for the trellis root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Configuration file structure for trellis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct TrellisConfig {
    /// Ticket directory, relative to the repository root
    pub tickets_dir: String,

    /// Reject unknown relationship types when loading
    pub strict_links: bool,

    /// Commit every change to version control
    pub auto_commit: bool,

    /// Prefix for ticket branch names
    pub branch_prefix: String,
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self {
            tickets_dir: DEFAULT_TICKETS_DIR.to_string(),
            strict_links: false,
            auto_commit: false,
            branch_prefix: String::new(),
        }
    }
}

impl TrellisConfig {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid YAML, or holds
    /// values rejected by [`TrellisConfig::validate`].
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(ConfigError::from)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Checks values that YAML alone cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty, absolute or escaping
    /// ticket directory, or a branch prefix containing whitespace.
    pub fn validate(&self) -> Result<()> {
        let tickets_dir = Path::new(self.tickets_dir.trim());
        if tickets_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("tickets-dir cannot be empty".to_string()).into());
        }
        let escapes = tickets_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ConfigError::Invalid(format!(
                "tickets-dir must be a relative path inside the repository, got '{}'",
                self.tickets_dir
            ))
            .into());
        }
        if self.branch_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "branch-prefix cannot contain whitespace, got '{}'",
                self.branch_prefix
            ))
            .into());
        }
        Ok(())
    }

    /// Absolute ticket directory for a repository rooted at `root`.
    pub fn tickets_path(&self, root: &Path) -> PathBuf {
        root.join(self.tickets_dir.trim())
    }

    /// Store behaviour selected by this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            strict_links: self.strict_links,
            auto_commit: self.auto_commit,
            branch_prefix: self.branch_prefix.clone(),
        }
    }
}

/// Path of the configuration file for a repository rooted at `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(TRELLIS_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Check if a directory has been initialized with trellis.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(TRELLIS_DIR_NAME).is_dir()
}

/// Find the trellis root directory by searching up the directory tree.
///
/// Returns the directory containing `.trellis/`, or `None` if there is
/// none within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_trellis_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if is_initialized(&current) {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
