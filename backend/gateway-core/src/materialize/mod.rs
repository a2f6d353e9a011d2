//! Kubeconfig materialization.
//!
//! Turns a [`CredentialBundle`] into the kubeconfig file the embedded server
//! reads at startup and on its own reload cadence.
//!
//! # Atomicity
//!
//! The file is written to a temp file in the same directory and renamed over
//! the canonical path, so a concurrent reader sees either the previous or the
//! new document, never a partial one. The temp file is created `0600`.

pub mod kubeconfig;

pub use kubeconfig::Kubeconfig;

use crate::credentials::CredentialBundle;
use crate::error::MaterializeError;

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

/// Writes kubeconfig documents to one canonical path.
#[derive(Debug, Clone)]
pub struct ConfigMaterializer {
    path: PathBuf,
}

impl ConfigMaterializer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Canonical kubeconfig path passed to the embedded server.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the kubeconfig for `bundle` without touching the filesystem.
    pub fn render(&self, bundle: &CredentialBundle) -> Result<String, MaterializeError> {
        Kubeconfig::from_bundle(bundle)?.to_yaml()
    }

    /// Render and atomically replace the kubeconfig file.
    ///
    /// # Errors
    ///
    /// - [`MaterializeError::EmptyBundle`] if the bundle has no clusters
    /// - [`MaterializeError::Render`] if serialization fails
    /// - [`MaterializeError::Write`] if the temp file cannot be created, written or renamed
    pub fn materialize(&self, bundle: &CredentialBundle) -> Result<PathBuf, MaterializeError> {
        let contents = self.render(bundle)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(dir).map_err(|e| MaterializeError::write(dir, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| MaterializeError::write(dir, e))?;
        debug!("Writing kubeconfig via {}", temp.path().display());

        temp.write_all(contents.as_bytes())
            .map_err(|e| MaterializeError::write(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| MaterializeError::write(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| MaterializeError::write(&self.path, e.error))?;

        info!(
            "Kubeconfig written to {} ({} cluster(s))",
            self.path.display(),
            bundle.len()
        );

        Ok(self.path.clone())
    }
}
