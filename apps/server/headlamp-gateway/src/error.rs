use gateway_core::error::CoreError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors raised while bringing the gateway binary up or down.
///
/// Library failures arrive as [`CoreError`] and are flattened into
/// [`GatewayAppError::Core`] so the binary reports one shape on exit.
#[derive(Debug, Error)]
pub enum GatewayAppError {
    /// Error from this binary (directories, logger, signals)
    #[error("Gateway App Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from gateway-core operations (config, gateway, supervisor)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl GatewayAppError {
    #[track_caller]
    pub fn app(message: impl Into<String>) -> Self {
        Self::App {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for GatewayAppError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        Self::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
