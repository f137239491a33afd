//! Application context for CLI command execution.
//!
//! [`App`] finds the repository, reads its configuration, picks the
//! version-control backend and loads the ticket store.
//!
//! # Example
//!
//! ```no_run
//! use trellis::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     println!("{} tickets", app.store().len());
//!     Ok(())
//! }
//! ```

use crate::config::{self, TrellisConfig};
use crate::error::{ConfigError, Result};
use crate::fs::LocalFs;
use crate::store::TicketStore;
use crate::vcs::{GitCli, NoVcs, VersionControl};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application context for CLI operations.
pub struct App {
    store: TicketStore,
    root_dir: PathBuf,
    config: TrellisConfig,
    has_vcs: bool,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("root_dir", &self.root_dir)
            .field("config", &self.config)
            .field("has_vcs", &self.has_vcs)
            .field("store", &self.store)
            .finish()
    }
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree for `.trellis/`, loads configuration
    /// and then every ticket.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No trellis repository is found in the directory tree
    /// - Configuration cannot be loaded
    /// - The ticket directory cannot be listed
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = config::find_trellis_root(working_dir).ok_or(ConfigError::NotInitialized)?;
        let config = TrellisConfig::load(&config::config_path(&root_dir)).await?;

        let has_vcs = GitCli::is_repository(&root_dir);
        let vcs: Arc<dyn VersionControl> = if has_vcs {
            Arc::new(GitCli::new(&root_dir))
        } else {
            tracing::debug!("No git repository found, version control disabled");
            Arc::new(NoVcs)
        };

        let store = TicketStore::load(
            config.tickets_path(&root_dir),
            Arc::new(LocalFs),
            vcs,
            config.store_options(),
        )
        .await?;

        Ok(Self {
            store,
            root_dir,
            config,
            has_vcs,
        })
    }

    /// The loaded tickets.
    pub fn store(&self) -> &TicketStore {
        &self.store
    }

    /// The loaded tickets, for mutation.
    pub fn store_mut(&mut self) -> &mut TicketStore {
        &mut self.store
    }

    /// Directory containing `.trellis/`.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Repository configuration.
    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// Whether the repository is under git.
    pub fn has_vcs(&self) -> bool {
        self.has_vcs
    }
}
