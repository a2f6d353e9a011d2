use crate::config::EmbeddedConfig;
use crate::error::SupervisorError;

use std::env::current_exe;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, error, info};
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;

const KUBECONFIG_FLAG: &str = "--kubeconfig";
const PLUGINS_DIR_FLAG: &str = "--plugins-dir";
const BASE_URL_FLAG: &str = "--base-url";
const PORT_FLAG: &str = "--port";

/// Everything needed to launch the embedded server, minus the kubeconfig path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub binary: String,
    pub plugins_dir: PathBuf,
    pub port: u16,
    pub base_path: String,
    pub display_name: String,
}

impl LaunchSpec {
    pub fn from_config(config: &EmbeddedConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            plugins_dir: config.plugins_dir.clone(),
            port: config.port,
            base_path: config.base_path.clone(),
            display_name: config.display_name.clone(),
        }
    }
}

pub(crate) fn build_spawn_command(
    binary: &Path,
    launch: &LaunchSpec,
    kubeconfig: &Path,
) -> TokioCommand {
    let mut cmd = TokioCommand::new(binary);
    cmd.arg(KUBECONFIG_FLAG)
        .arg(kubeconfig)
        .arg(PLUGINS_DIR_FLAG)
        .arg(&launch.plugins_dir)
        .arg(BASE_URL_FLAG)
        .arg(&launch.base_path)
        .arg(PORT_FLAG)
        .arg(launch.port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Spawn the embedded server.
///
/// A bare binary name is looked up on `PATH` first and then next to the
/// current executable, where packaged builds place it.
pub(crate) fn spawn_process(
    launch: &LaunchSpec,
    kubeconfig: &Path,
) -> Result<TokioChild, SupervisorError> {
    let binary = Path::new(&launch.binary);
    debug!("Attempting to spawn {}", binary.display());

    match build_spawn_command(binary, launch, kubeconfig).spawn() {
        Ok(child) => {
            info!(
                "Spawned {} from {} (PID: {:?})",
                launch.display_name,
                binary.display(),
                child.id()
            );
            Ok(child)
        }
        Err(err) if err.kind() == ErrorKind::NotFound && binary.components().count() == 1 => {
            debug!("{} not in PATH, trying local binary", launch.binary);
            spawn_local_binary(launch, kubeconfig)
        }
        Err(err) => Err(SupervisorError::spawn(
            format!("Failed to spawn {}: {err}", binary.display()),
            err,
        )),
    }
}

fn spawn_local_binary(
    launch: &LaunchSpec,
    kubeconfig: &Path,
) -> Result<TokioChild, SupervisorError> {
    let exe = current_exe().map_err(|e| {
        SupervisorError::spawn(format!("Failed to get current executable path: {e}"), e)
    })?;

    let dir = exe.parent().ok_or_else(|| {
        SupervisorError::spawn(
            format!("Executable has no parent directory: {}", exe.display()),
            std::io::Error::new(ErrorKind::NotFound, "no parent dir"),
        )
    })?;

    let local_path = dir.join(&launch.binary);
    debug!("Attempting to spawn from {}", local_path.display());

    build_spawn_command(&local_path, launch, kubeconfig)
        .current_dir(dir)
        .spawn()
        .map_err(|e| {
            SupervisorError::spawn(
                format!(
                    "Failed to spawn {} from PATH or {}: {e}",
                    launch.binary,
                    local_path.display()
                ),
                e,
            )
        })
}

/// Forward the child's stdout (info) and stderr (error) to the log, line by line.
pub(crate) fn capture_output(child: &mut TokioChild, label: &str) -> Result<(), SupervisorError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SupervisorError::output_capture("Child process has no stdout"))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SupervisorError::output_capture("Child process has no stderr"))?;

    let stdout_label = label.to_string();
    TokioSpawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!("{stdout_label} stdout: {line}");
        }
        debug!("{stdout_label} stdout closed");
    });

    let stderr_label = label.to_string();
    TokioSpawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            error!("{stderr_label} stderr: {line}");
        }
        debug!("{stderr_label} stderr closed");
    });

    Ok(())
}
