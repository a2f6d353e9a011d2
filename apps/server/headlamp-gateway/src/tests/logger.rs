// Unit tests for logger module

use crate::logger::{LOG_FILE_NAME, initialize, open_log_file, resolve_level};

use std::path::PathBuf;

use log::LevelFilter;
use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: fern panics-by-error when a second global logger is installed; a
/// repeated call during startup must not take the process down.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed.
#[test]
#[serial(logger)]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN
    let temp_dir = TempDir::new().expect("temp dir");

    // WHEN
    let result1 = initialize(temp_dir.path());
    let result2 = initialize(temp_dir.path());

    // THEN
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );
}

/// **VALUE**: Verifies the log file is created inside a directory that does not exist yet.
///
/// **BUG THIS CATCHES**: Would catch the first run on a fresh machine failing because
/// `{config_dir}/logs` was never created.
#[test]
fn given_missing_log_dir_when_opening_file_then_created() {
    // GIVEN
    let temp_dir = TempDir::new().expect("temp dir");
    let log_dir = temp_dir.path().join("nested").join("logs");

    // WHEN
    let result = open_log_file(&log_dir);

    // THEN
    assert!(result.is_ok(), "Expected log file, got {result:?}");
    assert!(log_dir.join(LOG_FILE_NAME).exists());
}

/// **VALUE**: Verifies an unusable log directory is an error, not a panic.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file()` being unwrapped.
#[test]
fn given_invalid_log_dir_when_opening_file_then_returns_error() {
    // GIVEN: A path below a regular file can never be a directory
    let temp_dir = TempDir::new().expect("temp dir");
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "").expect("write blocker");
    let invalid_dir = PathBuf::from(&blocker).join("logs");

    // WHEN
    let result = open_log_file(&invalid_dir);

    // THEN
    let err = result.expect_err("Should return error for invalid log directory");
    assert!(
        format!("{err:?}").contains("App"),
        "Error should be GatewayAppError::App variant"
    );
}

/// **VALUE**: Verifies the level override parses known names and ignores junk.
///
/// **BUG THIS CATCHES**: Would catch a typo in the env var silencing all logs.
#[test]
fn given_level_override_when_resolved_then_valid_names_only() {
    // GIVEN / WHEN / THEN
    assert_eq!(resolve_level(Some("trace")), LevelFilter::Trace);
    assert_eq!(resolve_level(Some(" WARN ")), LevelFilter::Warn);
    assert_eq!(resolve_level(Some("loud")), resolve_level(None));
}
