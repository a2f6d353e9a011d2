use crate::error::credentials::CredentialError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum MaterializeError {
    #[error("Empty Credential Bundle: no clusters to write {location}")]
    EmptyBundle { location: ErrorLocation },

    #[error("Kubeconfig Render Error: {message} {location}")]
    Render {
        message: String,
        location: ErrorLocation,
    },

    #[error("Kubeconfig Write Error: {path}: {source} {location}")]
    Write {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl MaterializeError {
    #[track_caller]
    pub fn empty_bundle() -> Self {
        MaterializeError::EmptyBundle {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MaterializeError::Write {
            path: path.into(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }
}

impl From<serde_yaml::Error> for MaterializeError {
    #[track_caller]
    fn from(error: serde_yaml::Error) -> Self {
        MaterializeError::Render {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
