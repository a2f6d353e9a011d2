//! Message contract between the host and the embedded surface.
//!
//! Every message is a JSON envelope `{ "type": ..., "payload": ... }`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    AuthToken,
    AuthTokenAck,
    Kubeconfig,
    KubeconfigAck,
    Redirect,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn auth_token(token: &str) -> Self {
        Self::new(MessageType::AuthToken, json!({ "token": token }))
    }

    pub fn kubeconfig(document: &str) -> Self {
        Self::new(MessageType::Kubeconfig, json!({ "kubeconfig": document }))
    }

    pub fn ack(kind: MessageType) -> Self {
        Self::new(kind, Value::Null)
    }

    pub fn redirect(path: &str) -> Self {
        Self::new(MessageType::Redirect, json!({ "redirectPath": path }))
    }

    /// Parse inbound message data. Anything that is not an envelope yields `None`.
    ///
    /// A bare `{ "redirectPath": ... }` object is also accepted as a redirect.
    pub fn parse(data: &Value) -> Option<Self> {
        if let Ok(envelope) = serde_json::from_value::<Envelope>(data.clone()) {
            return Some(envelope);
        }

        data.get("redirectPath")
            .and_then(Value::as_str)
            .map(Self::redirect)
    }

    pub fn redirect_path(&self) -> Option<&str> {
        if self.kind != MessageType::Redirect {
            return None;
        }
        self.payload.get("redirectPath").and_then(Value::as_str)
    }

    /// Whether the payload carries a credential.
    pub fn is_sensitive(&self) -> bool {
        matches!(self.kind, MessageType::AuthToken | MessageType::Kubeconfig)
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Envelope");
        debug.field("kind", &self.kind);
        if self.is_sensitive() {
            debug.field("payload", &"[REDACTED]");
        } else {
            debug.field("payload", &self.payload);
        }
        debug.finish()
    }
}
