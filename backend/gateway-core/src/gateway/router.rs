use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::state::GatewayState;
use crate::gateway::{auth, headers, routes};

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

/// Build the gateway router.
///
/// Layer order, outermost first: CORS (answers preflight), frame policy,
/// authentication, then the routes and the proxy fallback.
pub fn build_router(config: &GatewayConfig, state: GatewayState) -> Result<Router, GatewayError> {
    let frame_policy = headers::frame_ancestors(&config.server.frame_ancestors)?;
    let cors = headers::cors_layer(state.token_header());

    let router = Router::new()
        .route(auth::HEALTH_PATH, get(routes::health_handler))
        .route("/start", post(routes::start_handler))
        .route("/refreshKubeconfig", post(routes::refresh_handler))
        .route("/fetchKubeconfig", post(routes::fetch_handler))
        .fallback(routes::proxy_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(headers::frame_policy_layer(frame_policy))
        .layer(cors)
        .with_state(state);

    Ok(router)
}
