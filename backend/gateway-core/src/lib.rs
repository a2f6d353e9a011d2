pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod gateway_client;
pub mod handshake;
pub mod materialize;
pub mod supervisor;

#[cfg(test)]
mod tests;

pub const EMBEDDED_BINARY: &str = "headlamp-server";
pub const EMBEDDED_DISPLAY_NAME: &str = "Headlamp Server";
pub const EMBEDDED_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const EMBEDDED_SERVER_PORT: u16 = 4466;
pub const EMBEDDED_SERVER_BASE_URL: &str =
    const_format::concatcp!("http://", EMBEDDED_SERVER_HOSTNAME);
pub const EMBEDDED_BASE_PATH: &str = "/api/headlamp";
pub const KUBECONFIG_FILE_NAME: &str = "kubeconfig.yaml";
pub const DEFAULT_GATEWAY_PORT: u16 = 7008;
pub const DEFAULT_TOKEN_HEADER: &str = "x-headlamp-token";
