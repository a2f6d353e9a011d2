//! Seams between the coordinator and the host.

use crate::error::HandshakeError;
use crate::handshake::messages::Envelope;

use async_trait::async_trait;

/// Posts messages into the embedded surface's isolated context.
#[async_trait]
pub trait SurfaceChannel: Send + Sync {
    /// Post `envelope`, restricted to `target_origin`.
    async fn post(&self, envelope: &Envelope, target_origin: &str) -> Result<(), HandshakeError>;
}

/// Source of the kubeconfig pushed into the surface.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Current kubeconfig for the signed-in user, fetched fresh.
    async fn kubeconfig(&self) -> Result<String, HandshakeError>;

    /// Ask the server side to rewrite its kubeconfig. Called on every refresh.
    async fn refresh_server(&self) -> Result<(), HandshakeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success { message: String },
    Error { message: String },
}

/// User-facing side effects.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Prompt for the credential sharing decision.
    fn request_consent(&self, origin: &str);

    /// Host navigation requested by the surface.
    fn navigate(&self, path: &str);
}
