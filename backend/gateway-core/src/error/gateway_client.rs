use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GatewayClientError {
    #[error("HTTP Error: {message} {location}")]
    Http {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("Gateway returned HTTP {status_code}: {message} {location}")]
    Status {
        status_code: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Ready: {message} {location}")]
    NotReady {
        message: String,
        location: ErrorLocation,
    },
}

impl GatewayClientError {
    #[track_caller]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        GatewayClientError::Status {
            status_code: HttpStatusCode(status),
            message: body.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_ready(message: impl Into<String>) -> Self {
        GatewayClientError::NotReady {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether polling again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayClientError::Http {
                is_timeout,
                is_connection,
                ..
            } => *is_timeout || *is_connection,
            GatewayClientError::Status { status_code, .. } => status_code.is_retryable(),
            GatewayClientError::Json { .. } => false,
            GatewayClientError::UrlParse { .. } => false,
            GatewayClientError::NotReady { .. } => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayClientError::Status { status_code, .. } => Some(status_code.0),
            _ => None,
        }
    }
}

impl From<url::ParseError> for GatewayClientError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        GatewayClientError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for GatewayClientError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return GatewayClientError::Status {
                status_code: HttpStatusCode(status.as_u16()),
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        GatewayClientError::Http {
            is_timeout: error.is_timeout(),
            is_connection: error.is_connect(),
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for GatewayClientError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        GatewayClientError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
