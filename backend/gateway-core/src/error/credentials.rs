//! Error types for credential lookup and caller authentication.
//!
//! Key design decisions:
//! - Lookup failures (`CredentialError`) are reported to the caller, never retried
//!   at the gateway layer
//! - Authentication failures (`AuthError`) always terminate the request with 401
//! - Neither variant ever carries a token value

use common::ErrorLocation;

use std::panic::Location;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error as ThisError;

/// Errors raised while obtaining identity tokens or cluster credentials.
#[derive(Debug, ThisError)]
pub enum CredentialError {
    #[error("Missing credential for '{subject}': {message} {location}")]
    Missing {
        subject: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Credential lookup failed: {message} {location}")]
    Lookup {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid cluster '{cluster}': {message} {location}")]
    InvalidCluster {
        cluster: String,
        message: String,
        location: ErrorLocation,
    },
}

impl CredentialError {
    #[track_caller]
    pub fn missing(subject: impl Into<String>, message: impl Into<String>) -> Self {
        CredentialError::Missing {
            subject: subject.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn lookup(message: impl Into<String>) -> Self {
        CredentialError::Lookup {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_cluster(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        CredentialError::InvalidCluster {
            cluster: cluster.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Reasons a caller's token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    /// Path with a `.` or `..` segment, raw or percent-encoded.
    UnsafePath,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToken => write!(f, "missing authentication token"),
            Self::InvalidFormat => write!(f, "invalid authorization format"),
            Self::InvalidToken => write!(f, "invalid authentication token"),
            Self::UnsafePath => write!(f, "path contains dot segments"),
        }
    }
}

/// A request that failed authentication. Answered with 401, or 400 for an unsafe path.
#[derive(Debug, ThisError)]
#[error("Auth Rejected: {reason} {location}")]
pub struct AuthError {
    pub reason: AuthFailure,
    pub location: ErrorLocation,
}

impl AuthError {
    #[track_caller]
    pub fn new(reason: AuthFailure) -> Self {
        AuthError {
            reason,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn missing_token() -> Self {
        Self::new(AuthFailure::MissingToken)
    }

    #[track_caller]
    pub fn invalid_token() -> Self {
        Self::new(AuthFailure::InvalidToken)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error) = match self.reason {
            AuthFailure::UnsafePath => (StatusCode::BAD_REQUEST, "bad_request"),
            _ => (StatusCode::UNAUTHORIZED, "unauthorized"),
        };

        let body = json!({
            "message": self.reason.to_string(),
            "error": error,
        });

        (status, Json(body)).into_response()
    }
}
