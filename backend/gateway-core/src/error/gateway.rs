//! Gateway-facing errors and their JSON response mapping.
//!
//! Handlers return [`GatewayError`]; the [`IntoResponse`] impl logs the full
//! error (with location) and sends only a short public message to the caller.

use crate::error::materialize::MaterializeError;
use crate::error::proxy::ProxyError;
use crate::error::supervisor::SupervisorError;

use common::ErrorLocation;

use std::panic::Location;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GatewayError {
    #[error("Start Failed: {source} {location}")]
    Start {
        location: ErrorLocation,
        #[source]
        source: SupervisorError,
    },

    #[error("Kubeconfig Refresh Failed: {source} {location}")]
    Refresh {
        location: ErrorLocation,
        #[source]
        source: MaterializeError,
    },

    #[error("Kubeconfig Fetch Failed: {source} {location}")]
    Fetch {
        location: ErrorLocation,
        #[source]
        source: MaterializeError,
    },

    #[error("Bind Error: {address}: {source} {location}")]
    Bind {
        address: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Serve Error: {message} {location}")]
    Serve {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl GatewayError {
    #[track_caller]
    pub fn start(source: impl Into<SupervisorError>) -> Self {
        GatewayError::Start {
            location: ErrorLocation::from(Location::caller()),
            source: source.into(),
        }
    }

    #[track_caller]
    pub fn refresh(source: impl Into<MaterializeError>) -> Self {
        GatewayError::Refresh {
            location: ErrorLocation::from(Location::caller()),
            source: source.into(),
        }
    }

    #[track_caller]
    pub fn fetch(source: impl Into<MaterializeError>) -> Self {
        GatewayError::Fetch {
            location: ErrorLocation::from(Location::caller()),
            source: source.into(),
        }
    }

    #[track_caller]
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        GatewayError::Bind {
            address: address.into(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }

    #[track_caller]
    pub fn serve(message: impl Into<String>) -> Self {
        GatewayError::Serve {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Proxy(e) if e.is_unreachable() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to send to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::Start { .. } => "Error starting Headlamp Server",
            GatewayError::Refresh { .. } => "Error refreshing kubeconfig",
            GatewayError::Fetch { .. } => "Error fetching kubeconfig",
            GatewayError::Bind { .. } | GatewayError::Serve { .. } => "Gateway unavailable",
            GatewayError::Proxy(ProxyError::Unreachable { .. }) => "Headlamp Server unreachable",
            GatewayError::Proxy(_) => "Error proxying request to Headlamp Server",
        }
    }

    pub fn error_category(&self) -> &'static str {
        match self {
            GatewayError::Start { source, .. } if source.is_spawn_failure() => "spawn_failure",
            GatewayError::Start { .. } => "credential_failure",
            GatewayError::Refresh { .. } | GatewayError::Fetch { .. } => "credential_failure",
            GatewayError::Bind { .. } | GatewayError::Serve { .. } => "gateway",
            GatewayError::Proxy(_) => "proxy_failure",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        error!("{self}");

        let body = json!({
            "message": self.public_message(),
            "error": self.error_category(),
        });

        (self.status_code(), Json(body)).into_response()
    }
}
