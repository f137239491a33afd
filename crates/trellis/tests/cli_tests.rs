//! Integration tests for the trellis CLI.
//!
//! These tests run the built binary against temporary repositories.

use rstest::{fixture, rstest};
use tempfile::TempDir;

mod common;
use common::run_trellis_in_dir;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Provides a temporary directory with an initialized trellis repository
#[fixture]
fn initialized_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let output = run_trellis_in_dir(temp.path(), &["init", "--quiet"]);
    assert!(
        output.status.success(),
        "Failed to initialize trellis: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    temp
}

fn json(output: &std::process::Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "Command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Output is not JSON")
}

// ============================================================================
// Help and Init
// ============================================================================

#[rstest]
fn test_cli_help(temp_dir: TempDir) {
    let output = run_trellis_in_dir(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trellis"));
    assert!(stdout.contains("Usage:"));
}

#[rstest]
fn test_init_creates_layout(temp_dir: TempDir) {
    let output = run_trellis_in_dir(temp_dir.path(), &["init"]);

    assert!(output.status.success());
    assert!(temp_dir.path().join(".trellis/config.yaml").is_file());
    assert!(temp_dir.path().join(".trellis/tickets").is_dir());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Initialized trellis"));
}

#[rstest]
fn test_init_twice_fails(initialized_dir: TempDir) {
    let output = run_trellis_in_dir(initialized_dir.path(), &["init"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already initialized"));
}

#[rstest]
fn test_commands_require_repository(temp_dir: TempDir) {
    let output = run_trellis_in_dir(temp_dir.path(), &["list"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not a trellis repository"));
}

// ============================================================================
// Ticket Lifecycle
// ============================================================================

#[rstest]
fn test_new_then_show(initialized_dir: TempDir) {
    let dir = initialized_dir.path();

    let created = json(&run_trellis_in_dir(
        dir,
        &["--json", "new", "Fix login bug", "--type", "bug"],
    ));
    assert_eq!(created["number"], 1);
    assert_eq!(created["slug"], "fix-login-bug");
    assert_eq!(created["status"], "TODO");
    assert_eq!(created["type"], "BUG");
    assert!(dir.join(".trellis/tickets/1-fix-login-bug.md").is_file());

    let shown = json(&run_trellis_in_dir(dir, &["--json", "show", "login"]));
    assert_eq!(shown["number"], 1);
    assert_eq!(shown["title"], "Fix login bug");
}

#[rstest]
fn test_link_cycle_is_refused(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    run_trellis_in_dir(dir, &["new", "Base"]);
    run_trellis_in_dir(dir, &["new", "Top", "--link", "blocks:1"]);

    let output = run_trellis_in_dir(dir, &["link", "1", "blocks", "2"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Circular relationship"));
    let base = std::fs::read_to_string(dir.join(".trellis/tickets/1-base.md")).unwrap();
    assert_eq!(base, "TODO\n\n# Base\n");
}

#[rstest]
fn test_list_filters_by_group_and_status(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    assert!(run_trellis_in_dir(dir, &["group", "mvp"]).status.success());
    run_trellis_in_dir(dir, &["new", "Outside", "--status", "done"]);
    run_trellis_in_dir(dir, &["new", "Inside open", "-g", "mvp"]);
    run_trellis_in_dir(dir, &["new", "Inside done", "-g", "mvp", "-s", "done"]);

    let listed = json(&run_trellis_in_dir(
        dir,
        &["--json", "list", "--status", "done", "--group", "mvp"],
    ));

    let numbers: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![3]);
}

#[rstest]
fn test_edit_and_move(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    run_trellis_in_dir(dir, &["new", "Wander"]);
    run_trellis_in_dir(dir, &["group", "later"]);

    assert!(run_trellis_in_dir(dir, &["edit", "1", "--status", "stopped"]).status.success());
    assert!(run_trellis_in_dir(dir, &["move", "wander", "later"]).status.success());

    let moved = std::fs::read_to_string(dir.join(".trellis/tickets/later/1-wander.md")).unwrap();
    assert!(moved.starts_with("STOPPED\n"));
}

#[rstest]
fn test_show_ambiguous_text_fails(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    run_trellis_in_dir(dir, &["new", "Fix login"]);
    run_trellis_in_dir(dir, &["new", "Fix logout"]);

    let output = run_trellis_in_dir(dir, &["show", "fix"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Expected one ticket"));
}

#[rstest]
fn test_load_warnings_go_to_stderr(initialized_dir: TempDir) {
    let dir = initialized_dir.path();
    std::fs::write(dir.join(".trellis/tickets/1-broken.md"), "no title\n").unwrap();

    let output = run_trellis_in_dir(dir, &["--json", "list"]);

    assert!(output.status.success());
    assert_eq!(json(&output), serde_json::json!([]));
    assert!(String::from_utf8_lossy(&output.stderr).contains("warning[parse]"));
}
