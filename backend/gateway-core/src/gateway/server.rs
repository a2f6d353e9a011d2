use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::router::build_router;
use crate::gateway::state::GatewayState;

use std::net::SocketAddr;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::spawn as TokioSpawn;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running gateway.
///
/// Dropping the handle without calling [`GatewayHandle::shutdown`] leaves the
/// server running until the runtime stops.
pub struct GatewayHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), GatewayError>>,
}

impl GatewayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(GatewayError::serve(format!("Gateway task failed: {e}"))),
        }
    }
}

/// Bind the gateway listener and serve in the background.
///
/// # Errors
///
/// Returns [`GatewayError::Bind`] if the listen address is unavailable, or a
/// router construction error if the configured headers are invalid.
pub async fn start_gateway(
    config: &GatewayConfig,
    state: GatewayState,
) -> Result<GatewayHandle, GatewayError> {
    let router = build_router(config, state)?;

    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| GatewayError::bind(&address, e))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| GatewayError::bind(&address, e))?;

    info!("Gateway listening on {local_addr}");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = TokioSpawn(async move {
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("Gateway shutting down");
        })
        .await;

        result.map_err(|e| {
            error!("Gateway server error: {e}");
            GatewayError::serve(e.to_string())
        })
    });

    Ok(GatewayHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}
