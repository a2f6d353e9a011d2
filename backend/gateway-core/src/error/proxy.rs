use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProxyError {
    #[error("Upstream Unreachable: {upstream}: {message} {location}")]
    Unreachable {
        upstream: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Upstream Error: {upstream}: {message} {location}")]
    Upstream {
        upstream: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Proxy Request Error: {message} {location}")]
    Request {
        message: String,
        location: ErrorLocation,
    },

    #[error("WebSocket Bridge Error: {message} {location}")]
    WebSocket {
        message: String,
        location: ErrorLocation,
    },
}

impl ProxyError {
    /// Categorise a reqwest failure. Connect and timeout errors mean the embedded
    /// server is not there (502); anything else is an upstream failure (500).
    #[track_caller]
    pub fn from_reqwest(upstream: impl Into<String>, error: &reqwest::Error) -> Self {
        let upstream = upstream.into();

        if error.is_connect() || error.is_timeout() {
            return ProxyError::Unreachable {
                upstream,
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        ProxyError::Upstream {
            upstream,
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unreachable(upstream: impl Into<String>, message: impl Into<String>) -> Self {
        ProxyError::Unreachable {
            upstream: upstream.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn upstream(upstream: impl Into<String>, message: impl Into<String>) -> Self {
        ProxyError::Upstream {
            upstream: upstream.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn request(message: impl Into<String>) -> Self {
        ProxyError::Request {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn websocket(message: impl Into<String>) -> Self {
        ProxyError::WebSocket {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ProxyError::Unreachable { .. })
    }
}
