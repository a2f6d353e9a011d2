use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum HandshakeError {
    #[error("Handshake Timeout: no {kind} acknowledgment after {attempts} attempts {location}")]
    Timeout {
        kind: &'static str,
        attempts: u32,
        location: ErrorLocation,
    },

    #[error("Handshake Credential Error: {message} {location}")]
    Credential {
        message: String,
        location: ErrorLocation,
    },

    #[error("Surface Channel Error: {message} {location}")]
    Channel {
        message: String,
        location: ErrorLocation,
    },

    #[error("Consent Store Error: {message} {location}")]
    Consent {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Surface Origin: {message} {location}")]
    Origin {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handshake coordinator stopped {location}")]
    Stopped { location: ErrorLocation },
}

impl HandshakeError {
    #[track_caller]
    pub fn timeout(kind: &'static str, attempts: u32) -> Self {
        HandshakeError::Timeout {
            kind,
            attempts,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn credential(message: impl Into<String>) -> Self {
        HandshakeError::Credential {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn channel(message: impl Into<String>) -> Self {
        HandshakeError::Channel {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn consent(message: impl Into<String>) -> Self {
        HandshakeError::Consent {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn origin(message: impl Into<String>) -> Self {
        HandshakeError::Origin {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn stopped() -> Self {
        HandshakeError::Stopped {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Short text for the user-visible notification. Never includes locations.
    pub fn user_message(&self) -> String {
        match self {
            HandshakeError::Timeout { kind, .. } => {
                format!("Headlamp did not acknowledge the {kind}; continuing without sign-in")
            }
            HandshakeError::Credential { .. } => {
                String::from("Could not obtain credentials for Headlamp")
            }
            HandshakeError::Channel { .. } => String::from("Could not reach the Headlamp view"),
            HandshakeError::Consent { .. } => {
                String::from("Could not read or save the credential sharing choice")
            }
            HandshakeError::Origin { .. } => String::from("Headlamp view has an invalid address"),
            HandshakeError::Stopped { .. } => String::from("Headlamp sign-in has stopped"),
        }
    }
}
