//! Implementation of the `init` command.
//!
//! Creates the `.trellis/` directory with a configuration file and an empty
//! ticket directory.

use crate::config::{self, TRELLIS_DIR_NAME, TrellisConfig};
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Placeholder that keeps an empty ticket directory under version control
pub const KEEP_FILE_NAME: &str = ".gitkeep";

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created trellis directory
    pub trellis_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the ticket directory
    pub tickets_dir: PathBuf,
}

/// Initialize a new trellis repository in the given directory.
///
/// `tickets_dir` overrides where tickets are kept, relative to `base_dir`.
///
/// # Errors
///
/// Returns an error if:
/// - The `.trellis/` directory already exists
/// - The ticket directory is not a relative path inside `base_dir`
/// - File system operations fail
pub async fn init(base_dir: &Path, tickets_dir: Option<&str>) -> Result<InitResult> {
    let trellis_dir = base_dir.join(TRELLIS_DIR_NAME);
    if trellis_dir.exists() {
        return Err(ConfigError::AlreadyInitialized(base_dir.to_path_buf()).into());
    }

    let config = TrellisConfig {
        tickets_dir: tickets_dir
            .map_or(config::DEFAULT_TICKETS_DIR, str::trim)
            .to_string(),
        ..TrellisConfig::default()
    };
    config.validate()?;

    fs::create_dir_all(&trellis_dir).await?;

    let config_file = config::config_path(base_dir);
    config.save(&config_file).await?;

    let tickets_path = config.tickets_path(base_dir);
    fs::create_dir_all(&tickets_path).await?;
    let keep_file = tickets_path.join(KEEP_FILE_NAME);
    if !keep_file.exists() {
        fs::write(&keep_file, "").await?;
    }

    tracing::info!(path = %trellis_dir.display(), "Initialized trellis repository");

    Ok(InitResult {
        trellis_dir,
        config_file,
        tickets_dir: tickets_path,
    })
}
