use crate::credentials::{ClusterCredential, CredentialBundle};
use crate::error::SupervisorError;
use crate::materialize::ConfigMaterializer;
use crate::supervisor::spawn::build_spawn_command;
use crate::supervisor::{LaunchSpec, ProcessState, ProcessSupervisor, StartOutcome};

use common::RedactedToken;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serial_test::serial;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn bundle(token: &str) -> CredentialBundle {
    CredentialBundle::new().with_cluster(
        "main",
        ClusterCredential::new("https://main.example.com", RedactedToken::new(token)),
    )
}

fn launch_spec(binary: &Path, dir: &Path) -> LaunchSpec {
    LaunchSpec {
        binary: binary.display().to_string(),
        plugins_dir: dir.join("plugins"),
        port: 4466,
        base_path: "/api/headlamp".to_string(),
        display_name: "Fake Headlamp".to_string(),
    }
}

/// Shell script standing in for the embedded server. Records its argv to
/// `args.txt` and then either stays up or exits straight away.
#[cfg(unix)]
fn fake_server(dir: &Path, stays_up: bool) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let args_file = dir.join("args.txt");
    let tail = if stays_up { "exec sleep 30" } else { "exit 3" };
    let script = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\necho \"fake server up\"\necho \"fake warning\" >&2\n{tail}\n",
        args_file.display()
    );

    let path = dir.join(if stays_up { "fake-headlamp" } else { "crashing-headlamp" });
    std::fs::write(&path, script).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[cfg(unix)]
fn supervisor_with(dir: &TempDir, stays_up: bool) -> ProcessSupervisor {
    let binary = fake_server(dir.path(), stays_up);
    ProcessSupervisor::new(
        launch_spec(&binary, dir.path()),
        ConfigMaterializer::new(dir.path().join("kube").join("config")),
    )
}

async fn wait_for_state(supervisor: &ProcessSupervisor, expected: ProcessState) {
    let mut rx = supervisor.subscribe();
    timeout(WAIT, rx.wait_for(|state| *state == expected))
        .await
        .expect("state change timed out")
        .expect("state channel closed");
}

/// **VALUE**: Verifies the spawn command carries every flag the embedded server needs.
///
/// **WHY THIS MATTERS**: Headlamp ignores unknown flags and falls back to defaults, so a typo
/// here starts a server on the wrong port with no kubeconfig and no error.
///
/// **BUG THIS CATCHES**: Would catch a dropped or reordered flag/value pair.
#[test]
fn given_launch_spec_when_command_built_then_args_match() {
    // GIVEN
    let launch = launch_spec(Path::new("headlamp-server"), Path::new("/data"));

    // WHEN
    let cmd = build_spawn_command(
        Path::new("headlamp-server"),
        &launch,
        Path::new("/tmp/kubeconfig"),
    );

    // THEN
    let std_cmd = cmd.as_std();
    assert_eq!(std_cmd.get_program(), "headlamp-server");
    let args: Vec<_> = std_cmd
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();
    assert_eq!(
        args,
        vec![
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--plugins-dir",
            "/data/plugins",
            "--base-url",
            "/api/headlamp",
            "--port",
            "4466",
        ]
    );
}

/// **VALUE**: Verifies a first start writes the kubeconfig and spawns the process.
///
/// **BUG THIS CATCHES**: Would catch the process being started before the kubeconfig exists,
/// which makes Headlamp start with no clusters.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_not_started_when_start_called_then_running_with_kubeconfig() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, true);
    assert_eq!(supervisor.state(), ProcessState::NotStarted);

    // WHEN
    let outcome = supervisor.start(&bundle("tok-1")).await.expect("start");

    // THEN
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(supervisor.state(), ProcessState::Running);
    assert!(supervisor.health().running);
    assert_eq!(supervisor.spawn_count(), 1);
    assert!(supervisor.pid().await.is_some());

    let kubeconfig = std::fs::read_to_string(supervisor.kubeconfig_path()).expect("kubeconfig");
    assert!(kubeconfig.contains("tok-1"));

    assert!(supervisor.shutdown().await);
}

/// **VALUE**: Verifies the spawned process receives the kubeconfig path and port.
///
/// **BUG THIS CATCHES**: Would catch the command being built with the materializer's directory
/// instead of its file path.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_running_process_when_args_inspected_then_kubeconfig_passed() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, true);
    let args_file = dir.path().join("args.txt");

    // WHEN
    supervisor.start(&bundle("tok")).await.expect("start");
    timeout(WAIT, async {
        while !std::fs::read_to_string(&args_file)
            .map(|s| s.contains("--port"))
            .unwrap_or(false)
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("script never wrote its args");

    // THEN
    let args = std::fs::read_to_string(&args_file).expect("args");
    let lines: Vec<_> = args.lines().collect();
    assert_eq!(lines[0], "--kubeconfig");
    assert_eq!(Path::new(lines[1]), supervisor.kubeconfig_path());
    assert!(lines.contains(&"4466"));

    supervisor.shutdown().await;
}

/// **VALUE**: Verifies concurrent starts spawn exactly one process.
///
/// **WHY THIS MATTERS**: The UI fires `/start` from every open tab; two servers would fight over
/// the same port and one would crash-loop.
///
/// **BUG THIS CATCHES**: Would catch a check-then-spawn race outside the slot lock.
#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial(process)]
async fn given_ten_concurrent_starts_when_awaited_then_single_spawn() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = Arc::new(supervisor_with(&dir, true));

    // WHEN
    let calls = (0..10).map(|i| {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.start(&bundle(&format!("tok-{i}"))).await })
    });
    let outcomes: Vec<StartOutcome> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("start"))
        .collect();

    // THEN
    assert_eq!(supervisor.spawn_count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == StartOutcome::Started)
            .count(),
        1
    );
    assert_eq!(supervisor.state(), ProcessState::Running);

    supervisor.shutdown().await;
}

/// **VALUE**: Verifies a second start only rewrites the kubeconfig.
///
/// **BUG THIS CATCHES**: Would catch `AlreadyRunning` skipping the refresh, leaving the running
/// server on expired tokens.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_running_when_started_again_then_kubeconfig_refreshed_without_spawn() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, true);
    supervisor.start(&bundle("tok-old")).await.expect("start");
    let pid = supervisor.pid().await;

    // WHEN
    let outcome = supervisor.start(&bundle("tok-new")).await.expect("restart");

    // THEN
    assert_eq!(outcome, StartOutcome::AlreadyRunning);
    assert_eq!(supervisor.spawn_count(), 1);
    assert_eq!(supervisor.pid().await, pid);
    let kubeconfig = std::fs::read_to_string(supervisor.kubeconfig_path()).expect("kubeconfig");
    assert!(kubeconfig.contains("tok-new"));
    assert!(!kubeconfig.contains("tok-old"));

    supervisor.shutdown().await;
}

/// **VALUE**: Verifies a missing binary leaves the supervisor in `Failed` with a spawn error.
///
/// **BUG THIS CATCHES**: Would catch a spawn failure leaving the state at `Starting` forever,
/// which the UI reads as "still booting".
#[tokio::test]
#[serial(process)]
async fn given_missing_binary_when_start_called_then_failed() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = ProcessSupervisor::new(
        launch_spec(&dir.path().join("does-not-exist"), dir.path()),
        ConfigMaterializer::new(dir.path().join("kubeconfig")),
    );

    // WHEN
    let result = supervisor.start(&bundle("tok")).await;

    // THEN
    assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
    assert_eq!(supervisor.state(), ProcessState::Failed);
    assert!(!supervisor.health().running);
    assert_eq!(supervisor.spawn_count(), 0);
}

/// **VALUE**: Verifies a kubeconfig failure aborts the start before anything is spawned.
///
/// **BUG THIS CATCHES**: Would catch the process being spawned against a stale or missing
/// kubeconfig when the new one could not be written.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_empty_bundle_when_start_called_then_not_started_and_no_spawn() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, true);

    // WHEN
    let result = supervisor.start(&CredentialBundle::new()).await;

    // THEN
    assert!(matches!(result, Err(SupervisorError::Materialize(_))));
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
    assert_eq!(supervisor.spawn_count(), 0);
}

/// **VALUE**: Verifies a process that exits on its own is forgotten, and the next start spawns again.
///
/// **WHY THIS MATTERS**: Without this, a crashed server would be reported as running and `/start`
/// would only ever refresh the kubeconfig.
///
/// **BUG THIS CATCHES**: Would catch the exit watcher not clearing the slot.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_process_exits_when_started_again_then_respawned() {
    // GIVEN: A binary that exits immediately
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, false);
    supervisor.start(&bundle("tok")).await.expect("start");

    // WHEN: It exits
    wait_for_state(&supervisor, ProcessState::NotStarted).await;

    // THEN: Nothing tracked; a new start spawns again
    assert_eq!(supervisor.pid().await, None);
    let outcome = supervisor.start(&bundle("tok")).await.expect("second start");
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(supervisor.spawn_count(), 2);
}

/// **VALUE**: Verifies shutdown kills the tracked process and is a no-op afterwards.
///
/// **BUG THIS CATCHES**: Would catch shutdown leaving the slot populated, so a later start would
/// never spawn.
#[cfg(unix)]
#[tokio::test]
#[serial(process)]
async fn given_running_when_shutdown_then_not_started_and_second_shutdown_false() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let supervisor = supervisor_with(&dir, true);
    supervisor.start(&bundle("tok")).await.expect("start");

    // WHEN
    let first = supervisor.shutdown().await;
    let second = supervisor.shutdown().await;

    // THEN
    assert!(first);
    assert!(!second);
    assert_eq!(supervisor.state(), ProcessState::NotStarted);
    assert_eq!(supervisor.pid().await, None);
}

/// **VALUE**: Verifies the health payload serializes in the shape the UI polls.
///
/// **BUG THIS CATCHES**: Would catch a renamed field or a non-snake-case state.
#[test]
fn given_fresh_supervisor_when_health_serialized_then_ok_and_not_running() {
    // GIVEN
    let supervisor = ProcessSupervisor::new(
        launch_spec(Path::new("headlamp-server"), Path::new("/tmp")),
        ConfigMaterializer::new("/tmp/unused-kubeconfig"),
    );

    // WHEN
    let json = serde_json::to_value(supervisor.health()).expect("serialize");

    // THEN
    assert_eq!(
        json,
        serde_json::json!({ "status": "ok", "running": false, "state": "not_started" })
    );
}
