use crate::error::credentials::CredentialError;
use crate::error::materialize::MaterializeError;

use common::ErrorLocation;

use std::error::Error as StdError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Output Capture Error: {message} {location}")]
    OutputCapture {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

impl SupervisorError {
    #[track_caller]
    pub fn spawn(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        SupervisorError::Spawn {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(source),
        }
    }

    #[track_caller]
    pub fn output_capture(message: impl Into<String>) -> Self {
        SupervisorError::OutputCapture {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Spawn failures are retryable on the next start request; credential
    /// failures need the caller to fix their credentials first.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(
            self,
            SupervisorError::Spawn { .. } | SupervisorError::OutputCapture { .. }
        )
    }
}

impl From<CredentialError> for SupervisorError {
    fn from(error: CredentialError) -> Self {
        SupervisorError::Materialize(MaterializeError::Credentials(error))
    }
}
