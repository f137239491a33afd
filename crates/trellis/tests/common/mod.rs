//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use tempfile::TempDir;
use trellis::fs::LocalFs;
use trellis::store::{StoreOptions, TicketStore};
use trellis::vcs::NoVcs;

/// A temporary ticket root with nothing in it.
pub fn ticket_root() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let root = temp.path().join("tickets");
    std::fs::create_dir_all(&root).expect("Failed to create ticket root");
    (temp, root)
}

/// Write a ticket file, creating its group directories.
pub fn write_ticket(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create group directory");
    }
    std::fs::write(&path, body).expect("Failed to write ticket");
}

/// Load a store from disk without version control.
pub async fn open_store(root: &Path) -> TicketStore {
    TicketStore::load(
        root.to_path_buf(),
        Arc::new(LocalFs),
        Arc::new(NoVcs),
        StoreOptions::default(),
    )
    .await
    .expect("Failed to load ticket store")
}

/// Snapshot every file under `root` as (relative path, contents), sorted.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, String)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) {
        for entry in std::fs::read_dir(dir).expect("Failed to read directory") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let contents = std::fs::read_to_string(&path).expect("Failed to read file");
                out.push((path.strip_prefix(root).unwrap().to_path_buf(), contents));
            }
        }
    }
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}

/// Run the trellis binary in the specified directory
pub fn run_trellis_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute trellis binary")
}
