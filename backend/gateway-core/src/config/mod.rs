//! Gateway configuration loaded from `{config_dir}/gateway.json`.
//!
//! Every section is `#[serde(default)]` so a partial file only overrides what it
//! names. `HEADLAMP_BINARY_PATH` overrides the embedded binary after loading.

use crate::error::config::ConfigError;
use crate::{
    DEFAULT_GATEWAY_PORT, DEFAULT_TOKEN_HEADER, EMBEDDED_BASE_PATH, EMBEDDED_BINARY,
    EMBEDDED_DISPLAY_NAME, EMBEDDED_SERVER_PORT, KUBECONFIG_FILE_NAME,
};

use common::ErrorLocation;

use std::collections::HashSet;
use std::env;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};

use axum::http::HeaderName;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const CONFIG_FILE_NAME: &str = "gateway.json";
const CONFIG_VERSION: u32 = 1;
const CONFIG_DIR_ENV: &str = "HEADLAMP_GATEWAY_CONFIG_DIR";
const CONFIG_DIR_NAME: &str = "headlamp-gateway";
const BINARY_PATH_ENV: &str = "HEADLAMP_BINARY_PATH";
const PLUGINS_DIR_NAME: &str = "headlamp-plugins";

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// How the catch-all proxy maps an incoming path onto the upstream path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", content = "prefix", rename_all = "snake_case")]
pub enum PathRewrite {
    /// Forward the path unchanged.
    #[default]
    PassThrough,
    /// Prepend a fixed prefix, e.g. `/api/headlamp`.
    Prefix(String),
}

impl PathRewrite {
    /// Apply the rewrite to a request path (always starting with `/`).
    pub fn apply(&self, path: &str) -> String {
        match self {
            PathRewrite::PassThrough => path.to_string(),
            PathRewrite::Prefix(prefix) => {
                let prefix = prefix.trim_end_matches('/');
                if path == prefix || path.starts_with(&format!("{prefix}/")) {
                    path.to_string()
                } else {
                    format!("{prefix}{path}")
                }
            }
        }
    }
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    /// Origins allowed to frame the proxied UI, in addition to `'self'`.
    pub frame_ancestors: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("127.0.0.1"),
            listen_port: DEFAULT_GATEWAY_PORT,
            frame_ancestors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub binary_path: String,
    pub plugins_dir: PathBuf,
    pub port: u16,
    pub base_path: String,
    pub kubeconfig_path: PathBuf,
    pub display_name: String,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            binary_path: EMBEDDED_BINARY.to_string(),
            plugins_dir: env::temp_dir().join(PLUGINS_DIR_NAME),
            port: EMBEDDED_SERVER_PORT,
            base_path: EMBEDDED_BASE_PATH.to_string(),
            kubeconfig_path: env::temp_dir().join(KUBECONFIG_FILE_NAME),
            display_name: EMBEDDED_DISPLAY_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub path_rewrite: PathRewrite,
    /// Paths served without authentication. `/` matches only the root
    /// document; every other entry matches as a prefix.
    pub static_paths: Vec<String>,
    pub token_header: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            path_rewrite: PathRewrite::default(),
            static_paths: default_static_paths(),
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
        }
    }
}

/// One cluster the credential provider exposes to the embedded server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    pub name: String,
    pub server: String,
    /// Environment variable holding the bearer token for this cluster.
    pub token_env: String,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub embedded: EmbeddedConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            embedded: EmbeddedConfig::default(),
            proxy: ProxyConfig::default(),
            clusters: Vec::new(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_static_paths() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/assets/",
        "/static/",
        "/favicon",
        "/manifest.json",
        "/icons/",
        "/apple-touch-icon",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Resolve the config directory: `HEADLAMP_GATEWAY_CONFIG_DIR`, else the
/// platform config dir joined with `headlamp-gateway`.
pub fn default_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }

    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME))
}

// ============================================
// IMPLEMENTATION
// ============================================

impl GatewayConfig {
    /// Load config from `{config_dir}/gateway.json`.
    ///
    /// Returns defaults if the file does not exist. Returns an error if the file
    /// exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: GatewayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/gateway.json` with an atomic replace.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::write(config_dir, e))?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        let mut temp =
            NamedTempFile::new_in(config_dir).map_err(|e| ConfigError::write(config_dir, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| ConfigError::write(temp.path(), e))?;
        temp.persist(&config_path)
            .map_err(|e| ConfigError::write(&config_path, e.error))?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply environment overrides on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(binary) = env::var(BINARY_PATH_ENV)
            && !binary.trim().is_empty()
        {
            info!("Using {BINARY_PATH_ENV} override: {binary}");
            self.embedded.binary_path = binary;
        }
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        if self.server.listen_port == 0 {
            return Err(ConfigError::validation("listen_port must be non-zero"));
        }

        if self.embedded.port == 0 {
            return Err(ConfigError::validation("embedded port must be non-zero"));
        }

        if self.embedded.port == self.server.listen_port {
            return Err(ConfigError::validation(format!(
                "embedded port {} collides with the gateway listen port",
                self.embedded.port
            )));
        }

        if self.embedded.binary_path.trim().is_empty() {
            return Err(ConfigError::validation("binary_path cannot be empty"));
        }

        if !self.embedded.base_path.starts_with('/') {
            return Err(ConfigError::validation(format!(
                "base_path must start with '/': {}",
                self.embedded.base_path
            )));
        }

        if let PathRewrite::Prefix(prefix) = &self.proxy.path_rewrite
            && !prefix.starts_with('/')
        {
            return Err(ConfigError::validation(format!(
                "path_rewrite prefix must start with '/': {prefix}"
            )));
        }

        if let Some(bad) = self.proxy.static_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::validation(format!(
                "static path must start with '/': {bad}"
            )));
        }

        if HeaderName::from_bytes(self.proxy.token_header.as_bytes()).is_err() {
            return Err(ConfigError::validation(format!(
                "Invalid token header name: {}",
                self.proxy.token_header
            )));
        }

        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            if cluster.name.is_empty() {
                return Err(ConfigError::validation("cluster name cannot be empty"));
            }

            if !seen.insert(cluster.name.as_str()) {
                return Err(ConfigError::validation(format!(
                    "Duplicate cluster name: {}",
                    cluster.name
                )));
            }

            if !cluster.server.starts_with("http://") && !cluster.server.starts_with("https://") {
                return Err(ConfigError::validation(format!(
                    "Invalid server URL for cluster '{}': {}",
                    cluster.name, cluster.server
                )));
            }

            if cluster.token_env.trim().is_empty() {
                return Err(ConfigError::validation(format!(
                    "token_env cannot be empty for cluster '{}'",
                    cluster.name
                )));
            }
        }

        Ok(())
    }

    /// Socket address string the gateway binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.listen_address, self.server.listen_port)
    }
}
