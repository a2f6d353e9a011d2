pub mod config;
pub mod credentials;
pub mod gateway;
pub mod gateway_client;
pub mod handshake;
pub mod materialize;
pub mod proxy;
pub mod supervisor;

pub use credentials::{AuthError, AuthFailure, CredentialError};
pub use gateway::GatewayError;
pub use gateway_client::GatewayClientError;
pub use handshake::HandshakeError;
pub use materialize::MaterializeError;
pub use proxy::ProxyError;
pub use supervisor::SupervisorError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error(transparent)]
    Client(#[from] GatewayClientError),
}
