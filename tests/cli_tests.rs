//! CLI Integration Tests for duet
//!
//! Runs the built binary against temporary directories. Nothing here talks to
//! a real model backend.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the duet binary with `args` inside `dir`
fn run_duet(args: &[&str], dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_duet"))
        .args(args)
        .current_dir(dir)
        .env_remove("DUET_PROVIDER")
        .env_remove("DUET_API_BASE")
        .env_remove("DUET_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute duet")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run_duet(&["--help"], dir.path());

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("research"));
    assert!(text.contains("config"));
    assert!(text.contains("init"));
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = run_duet(&["--version"], dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains("duet"));
}

#[test]
fn test_research_help_lists_modes() {
    let dir = TempDir::new().unwrap();
    let output = run_duet(&["research", "--help"], dir.path());

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("--skip-clarification"));
    assert!(text.contains("balanced"));
    assert!(text.contains("--planner-model"));
}

// =============================================================================
// Init Command Tests
// =============================================================================

#[test]
fn test_init_creates_duet_toml() {
    let dir = TempDir::new().unwrap();
    let output = run_duet(&["--no-color", "init", "--provider", "openai"], dir.path());

    assert!(output.status.success(), "init failed: {:?}", output);
    let content = fs::read_to_string(dir.path().join("duet.toml")).unwrap();
    assert!(content.contains("type = \"openai\""));
    assert!(content.contains("OPENAI_API_KEY"));
    assert!(content.contains("min_search_cycles = 7"));
}

#[test]
fn test_init_refuses_existing_without_force() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("duet.toml"), "# keep me\n").unwrap();

    let output = run_duet(&["--no-color", "init"], dir.path());
    assert!(!output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("duet.toml")).unwrap(),
        "# keep me\n"
    );

    let output = run_duet(&["--no-color", "init", "--force"], dir.path());
    assert!(output.status.success());
    assert!(fs::read_to_string(dir.path().join("duet.toml"))
        .unwrap()
        .contains("[research]"));
}

// =============================================================================
// Config Command Tests
// =============================================================================

#[test]
fn test_config_shows_models_per_mode() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("duet.toml"),
        "[custom_models]\nplanner = \"my-planner\"\n",
    )
    .unwrap();

    let output = run_duet(&["--no-color", "config"], dir.path());

    assert!(output.status.success(), "config failed: {:?}", output);
    let text = stdout(&output);
    assert!(text.contains("gemini"));
    assert!(text.contains("--- deep ---"));
    assert!(text.contains("my-planner"));
}

#[test]
fn test_config_validate_reports_missing_key() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("duet.toml"),
        "[provider]\ntype = \"gemini\"\napi_key_env = \"DUET_TEST_KEY_THAT_IS_NOT_SET\"\n",
    )
    .unwrap();

    let output = run_duet(&["--no-color", "config", "--validate"], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DUET_TEST_KEY_THAT_IS_NOT_SET"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("duet.toml"),
        "[research]\nmax_concurrent_searches = 0\n",
    )
    .unwrap();

    let output = run_duet(&["config"], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_concurrent_searches"));
}

#[test]
fn test_research_without_api_key_fails_fast() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("duet.toml"),
        "[provider]\napi_key_env = \"DUET_TEST_KEY_THAT_IS_NOT_SET\"\n",
    )
    .unwrap();

    let output = run_duet(
        &["--no-color", "research", "anything", "--skip-clarification"],
        dir.path(),
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DUET_TEST_KEY_THAT_IS_NOT_SET"));
}
