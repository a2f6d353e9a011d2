//! Embedded server lifecycle supervision.
//!
//! [`ProcessSupervisor`] owns at most one embedded server process:
//!
//! - `start` spawns it once; later calls only refresh the kubeconfig
//! - `health` reads the current state without blocking
//! - a watcher task observes process exit and returns the state to
//!   `NotStarted` so the next `start` can spawn again
//!
//! There is no automatic respawn.
//!
//! # Concurrency
//!
//! The check-then-spawn sequence runs under one async mutex, so any number of
//! concurrent `start` calls produce exactly one spawn. State is published
//! through a `watch` channel so `health` never waits on that mutex.

pub mod spawn;

pub use spawn::LaunchSpec;

use crate::credentials::CredentialBundle;
use crate::error::{MaterializeError, SupervisorError};
use crate::materialize::ConfigMaterializer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use log::{error, info, warn};
use serde::Serialize;
use tokio::process::Child as TokioChild;
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, oneshot, watch};

/// Lifecycle state of the embedded server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Starting,
    Running,
    Failed,
}

/// Result of a successful `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub running: bool,
    pub state: ProcessState,
}

/// The one tracked process.
#[derive(Debug)]
pub struct SupervisedProcess {
    pub pid: Option<u32>,
    pub started_at: SystemTime,
    generation: u64,
    kill_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
struct Slot {
    process: Option<SupervisedProcess>,
    next_generation: u64,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ProcessState>,
}

impl Shared {
    fn set_state(&self, state: ProcessState) {
        self.state_tx.send_replace(state);
    }

    /// Forget the process if it is still the one identified by `generation`.
    async fn clear_if_current(&self, generation: u64) {
        let mut slot = self.slot.lock().await;

        match slot.process.as_ref() {
            Some(process) if process.generation == generation => {
                slot.process = None;
                self.set_state(ProcessState::NotStarted);
                info!("Embedded server (generation {generation}) no longer tracked");
            }
            _ => {}
        }
    }
}

/// Supervisor for the embedded server process.
#[derive(Debug)]
pub struct ProcessSupervisor {
    launch: LaunchSpec,
    materializer: ConfigMaterializer,
    shared: Arc<Shared>,
    spawn_count: AtomicU64,
}

impl ProcessSupervisor {
    pub fn new(launch: LaunchSpec, materializer: ConfigMaterializer) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::NotStarted);

        Self {
            launch,
            materializer,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                state_tx,
            }),
            spawn_count: AtomicU64::new(0),
        }
    }

    pub fn launch_spec(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn kubeconfig_path(&self) -> &Path {
        self.materializer.path()
    }

    /// Start the embedded server, or refresh its kubeconfig if already tracked.
    ///
    /// # Returns
    ///
    /// * `Ok(StartOutcome::Started)` - kubeconfig written and process spawned
    /// * `Ok(StartOutcome::AlreadyRunning)` - kubeconfig rewritten for `bundle`, no spawn
    /// * `Err(SupervisorError)` - materialization or spawn failed
    pub async fn start(&self, bundle: &CredentialBundle) -> Result<StartOutcome, SupervisorError> {
        let mut slot = self.shared.slot.lock().await;

        if slot.process.is_some() {
            info!(
                "{} already running, refreshing kubeconfig",
                self.launch.display_name
            );
            self.materializer.materialize(bundle)?;
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.shared.set_state(ProcessState::Starting);

        if let Err(e) = self.materializer.materialize(bundle) {
            error!("Error creating kubeconfig before start: {e}");
            self.shared.set_state(ProcessState::NotStarted);
            return Err(e.into());
        }

        let mut child = match spawn::spawn_process(&self.launch, self.materializer.path()) {
            Ok(child) => child,
            Err(e) => {
                error!("Error starting {}: {e}", self.launch.display_name);
                self.shared.set_state(ProcessState::Failed);
                return Err(e);
            }
        };

        if let Err(e) = spawn::capture_output(&mut child, &self.launch.display_name) {
            error!("Error capturing {} output: {e}", self.launch.display_name);
            let _ = child.kill().await;
            self.shared.set_state(ProcessState::Failed);
            return Err(e);
        }

        let generation = slot.next_generation;
        slot.next_generation += 1;

        let (kill_tx, kill_rx) = oneshot::channel();
        let pid = child.id();

        slot.process = Some(SupervisedProcess {
            pid,
            started_at: SystemTime::now(),
            generation,
            kill_tx: Some(kill_tx),
        });
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        self.shared.set_state(ProcessState::Running);

        TokioSpawn(watch_exit(
            Arc::clone(&self.shared),
            child,
            generation,
            kill_rx,
            self.launch.display_name.clone(),
        ));

        info!(
            "{} started (PID: {:?}, port {}, base path {})",
            self.launch.display_name, pid, self.launch.port, self.launch.base_path
        );

        Ok(StartOutcome::Started)
    }

    /// Rewrite the kubeconfig for `bundle` without touching the process.
    ///
    /// The embedded server picks up the new file on its own reload cadence.
    pub fn refresh(&self, bundle: &CredentialBundle) -> Result<PathBuf, MaterializeError> {
        self.materializer.materialize(bundle)
    }

    /// Kubeconfig document for `bundle`, not written anywhere.
    pub fn render(&self, bundle: &CredentialBundle) -> Result<String, MaterializeError> {
        self.materializer.render(bundle)
    }

    /// Current health. Never blocks and never fails.
    pub fn health(&self) -> Health {
        let state = *self.shared.state_tx.borrow();

        Health {
            status: "ok",
            running: state == ProcessState::Running,
            state,
        }
    }

    pub fn state(&self) -> ProcessState {
        *self.shared.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.shared.state_tx.subscribe()
    }

    /// Number of processes spawned over the supervisor's lifetime.
    pub fn spawn_count(&self) -> u64 {
        self.spawn_count.load(Ordering::SeqCst)
    }

    /// PID of the tracked process, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.shared
            .slot
            .lock()
            .await
            .process
            .as_ref()
            .and_then(|p| p.pid)
    }

    /// Kill the tracked process, if any. Returns whether one was tracked.
    pub async fn shutdown(&self) -> bool {
        let mut slot = self.shared.slot.lock().await;

        let Some(mut process) = slot.process.take() else {
            return false;
        };

        info!(
            "Stopping {} (PID: {:?})",
            self.launch.display_name, process.pid
        );

        if let Some(kill_tx) = process.kill_tx.take()
            && kill_tx.send(()).is_err()
        {
            warn!("Exit watcher already gone for PID {:?}", process.pid);
        }

        self.shared.set_state(ProcessState::NotStarted);
        true
    }
}

/// Owns the child until it exits or a kill is requested.
///
/// Dropping the kill sender (supervisor dropped) also kills the child.
async fn watch_exit(
    shared: Arc<Shared>,
    mut child: TokioChild,
    generation: u64,
    kill_rx: oneshot::Receiver<()>,
    label: String,
) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => warn!("{label} exited: {status}"),
                Err(e) => error!("Failed waiting on {label}: {e}"),
            }
        }
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {label}: {e}");
            } else {
                info!("{label} stopped");
            }
        }
    }

    shared.clear_if_current(generation).await;
}
