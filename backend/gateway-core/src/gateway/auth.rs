//! Request authentication for the gateway.
//!
//! Every request passes through [`auth_middleware`]. Public paths (`/health`
//! and the static asset allow-list) go straight through; everything else
//! needs a token that the host [`TokenValidator`](crate::credentials::TokenValidator)
//! accepts. On success the [`CallerCredentials`] are stored in the request
//! extensions for the handlers.
//!
//! # Security
//!
//! A rejected request is answered here and never reaches a handler or the
//! upstream proxy. Paths with dot segments are refused outright: the
//! allow-list matches the raw path, while the upstream URL parser would
//! resolve `..` and reach a protected route.

use crate::credentials::CallerCredentials;
use crate::error::{AuthError, AuthFailure};
use crate::gateway::state::GatewayState;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use log::{debug, warn};

pub const HEALTH_PATH: &str = "/health";

const BEARER_PREFIX: &str = "Bearer ";

/// True if any segment of `path` is `.` or `..`, including `%2e` spellings.
///
/// Backslashes count as separators because URL parsing treats them as `/`
/// for `http` URLs.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment
            .to_ascii_lowercase()
            .replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Paths served without authentication.
///
/// `/` only matches exactly; every other entry matches as a prefix.
#[derive(Debug, Clone, Default)]
pub struct StaticAllowList {
    entries: Vec<String>,
}

impl StaticAllowList {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn allows(&self, path: &str) -> bool {
        if path == HEALTH_PATH {
            return true;
        }

        self.entries.iter().any(|entry| {
            if entry == "/" {
                path == "/"
            } else {
                path.starts_with(entry.as_str())
            }
        })
    }
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path();

    if has_dot_segment(path) {
        warn!("Rejected {} {}: dot segment in path", request.method(), path);
        return Err(AuthError::new(AuthFailure::UnsafePath));
    }

    if state.allow_list.allows(path) {
        debug!("Public path {path}, skipping authentication");
        return Ok(next.run(request).await);
    }

    let token = match extract_token(request.headers(), &state) {
        Ok(token) => token,
        Err(e) => {
            warn!("Rejected {} {}: {}", request.method(), path, e.reason);
            return Err(e);
        }
    };

    let caller = match state.validator.validate(&token).await {
        Ok(caller) => caller,
        Err(e) => {
            warn!("Rejected {} {}: {}", request.method(), path, e.reason);
            return Err(e);
        }
    };

    debug!("Authenticated {} for {}", caller.principal, path);
    request.extensions_mut().insert::<CallerCredentials>(caller);

    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer` or, failing that, the custom token header.
///
/// An `Authorization` header with another scheme (a host proxy may add
/// `Basic`) does not hide the custom header.
fn extract_token(headers: &HeaderMap, state: &GatewayState) -> Result<String, AuthError> {
    let authorization = headers.get(AUTHORIZATION);

    if let Some(token) = authorization
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
    {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::missing_token());
        }
        return Ok(token.to_string());
    }

    if let Some(value) = headers.get(&state.token_header) {
        let token = value
            .to_str()
            .map_err(|_| AuthError::new(AuthFailure::InvalidFormat))?
            .trim();

        if token.is_empty() {
            return Err(AuthError::missing_token());
        }

        return Ok(token.to_string());
    }

    match authorization {
        Some(_) => Err(AuthError::new(AuthFailure::InvalidFormat)),
        None => Err(AuthError::missing_token()),
    }
}
