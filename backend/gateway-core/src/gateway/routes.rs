use crate::credentials::CallerCredentials;
use crate::error::GatewayError;
use crate::gateway::state::GatewayState;
use crate::gateway::websocket;
use crate::supervisor::{Health, StartOutcome};

use axum::Extension;
use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use log::info;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct KubeconfigResponse {
    pub kubeconfig: String,
}

/// GET /health
pub async fn health_handler(State(state): State<GatewayState>) -> Json<Health> {
    Json(state.supervisor.health())
}

/// POST /start
///
/// Spawns the embedded server for the first caller; later callers only get
/// their kubeconfig written.
pub async fn start_handler(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerCredentials>,
) -> Result<Json<MessageResponse>, GatewayError> {
    let bundle = state
        .provider
        .credential_bundle(&caller)
        .await
        .map_err(|e| GatewayError::start(e))?;

    let outcome = state
        .supervisor
        .start(&bundle)
        .await
        .map_err(|e| GatewayError::start(e))?;

    let name = &state.supervisor.launch_spec().display_name;
    let message = match outcome {
        StartOutcome::Started => format!("{name} started"),
        StartOutcome::AlreadyRunning => format!("{name} kubeconfig refreshed"),
    };

    info!("{message} for {}", caller.principal);
    Ok(Json(MessageResponse { message }))
}

/// POST /refreshKubeconfig
pub async fn refresh_handler(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerCredentials>,
) -> Result<Json<StatusResponse>, GatewayError> {
    let bundle = state
        .provider
        .credential_bundle(&caller)
        .await
        .map_err(|e| GatewayError::refresh(e))?;

    state
        .supervisor
        .refresh(&bundle)
        .map_err(|e| GatewayError::refresh(e))?;

    info!("Kubeconfig refreshed for {}", caller.principal);
    Ok(Json(StatusResponse { status: "ok" }))
}

/// POST /fetchKubeconfig
pub async fn fetch_handler(
    State(state): State<GatewayState>,
    Extension(caller): Extension<CallerCredentials>,
) -> Result<Json<KubeconfigResponse>, GatewayError> {
    let bundle = state
        .provider
        .credential_bundle(&caller)
        .await
        .map_err(|e| GatewayError::fetch(e))?;

    let kubeconfig = state
        .supervisor
        .render(&bundle)
        .map_err(|e| GatewayError::fetch(e))?;

    Ok(Json(KubeconfigResponse { kubeconfig }))
}

/// Everything else goes to the embedded server.
pub async fn proxy_handler(
    State(state): State<GatewayState>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    if websocket::is_upgrade_request(request.headers()) {
        return Ok(websocket::proxy_websocket(&state.proxy, request).await?);
    }

    Ok(state.proxy.forward(request).await?)
}
