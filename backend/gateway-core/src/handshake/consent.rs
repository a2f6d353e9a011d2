//! Persisted credential-sharing consent.
//!
//! The store is a JSON object of key → value, like browser local storage. Only
//! [`CONSENT_KEY`] is read or written; other keys in the file are preserved.

use crate::error::HandshakeError;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

pub const CONSENT_KEY: &str = "headlamp.credentialSharing.consent";
pub const CONSENT_FILE_NAME: &str = "consent.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub allowed: bool,
    pub remember: bool,
    pub decided_at: SystemTime,
}

impl ConsentRecord {
    pub fn new(allowed: bool, remember: bool) -> Self {
        Self {
            allowed,
            remember,
            decided_at: SystemTime::now(),
        }
    }
}

pub trait ConsentStore: Send + Sync {
    fn load(&self) -> Result<Option<ConsentRecord>, HandshakeError>;
    fn save(&self, record: &ConsentRecord) -> Result<(), HandshakeError>;
    /// Explicit user reset.
    fn clear(&self) -> Result<(), HandshakeError>;
}

/// Consent kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileConsentStore {
    path: PathBuf,
}

impl FileConsentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/consent.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONSENT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, Value>, HandshakeError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            HandshakeError::consent(format!("Failed to read {}: {e}", self.path.display()))
        })?;

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            HandshakeError::consent(format!("Corrupt consent store {}: {e}", self.path.display()))
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), HandshakeError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(dir).map_err(|e| {
            HandshakeError::consent(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| HandshakeError::consent(format!("Failed to serialize consent: {e}")))?;

        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| HandshakeError::consent(format!("Failed to create temp file: {e}")))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| HandshakeError::consent(format!("Failed to write consent: {e}")))?;
        temp.persist(&self.path).map_err(|e| {
            HandshakeError::consent(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }
}

impl ConsentStore for FileConsentStore {
    fn load(&self) -> Result<Option<ConsentRecord>, HandshakeError> {
        let entries = self.read_entries()?;

        match entries.get(CONSENT_KEY) {
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                HandshakeError::consent(format!("Invalid consent record: {e}"))
            }),
            None => Ok(None),
        }
    }

    fn save(&self, record: &ConsentRecord) -> Result<(), HandshakeError> {
        let mut entries = self.read_entries()?;
        let value = serde_json::to_value(record)
            .map_err(|e| HandshakeError::consent(format!("Failed to serialize consent: {e}")))?;
        entries.insert(CONSENT_KEY.to_string(), value);
        self.write_entries(&entries)?;

        info!(
            "Saved credential sharing consent (allowed: {}) to {}",
            record.allowed,
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), HandshakeError> {
        let mut entries = self.read_entries()?;
        if entries.remove(CONSENT_KEY).is_none() {
            debug!("No consent record to clear");
            return Ok(());
        }
        self.write_entries(&entries)?;

        info!("Cleared credential sharing consent");
        Ok(())
    }
}

/// In-process store for tests and hosts without a writable config dir.
#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    record: Mutex<Option<ConsentRecord>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: ConsentRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl ConsentStore for MemoryConsentStore {
    fn load(&self) -> Result<Option<ConsentRecord>, HandshakeError> {
        self.record
            .lock()
            .map(|guard| *guard)
            .map_err(|e| HandshakeError::consent(format!("Consent lock poisoned: {e}")))
    }

    fn save(&self, record: &ConsentRecord) -> Result<(), HandshakeError> {
        let mut guard = self
            .record
            .lock()
            .map_err(|e| HandshakeError::consent(format!("Consent lock poisoned: {e}")))?;
        *guard = Some(*record);
        Ok(())
    }

    fn clear(&self) -> Result<(), HandshakeError> {
        let mut guard = self
            .record
            .lock()
            .map_err(|e| HandshakeError::consent(format!("Consent lock poisoned: {e}")))?;
        *guard = None;
        Ok(())
    }
}
