//! Credential handshake with the embedded surface.
//!
//! After the surface loads, the host's identity token and then the derived
//! kubeconfig are posted into it, each retried until acknowledged or until the
//! attempt limit is reached. Nothing is sent before the user agrees to share
//! credentials.
//!
//! ```text
//! Idle → AwaitingConsent → SendingToken ⇄ AwaitingTokenAck
//!                        → SendingConfig ⇄ AwaitingConfigAck → Complete
//!                                                     (any push) → Failed
//! ```

pub mod channel;
pub mod consent;
pub mod coordinator;
pub mod delivery;
pub mod messages;
pub mod state;

pub use channel::{ConfigSource, Notification, Notifier, SurfaceChannel};
pub use consent::{CONSENT_KEY, ConsentRecord, ConsentStore, FileConsentStore, MemoryConsentStore};
pub use coordinator::{HandshakeCoordinator, HandshakeDeps, normalize_origin};
pub use delivery::{
    ACK_TIMEOUT, Delivery, DeliveryState, MAX_RETRY_ATTEMPTS, PayloadKind, REFRESH_INTERVAL,
    RETRY_BACKOFF, RetryPolicy, TimeoutOutcome,
};
pub use messages::{Envelope, MessageType};
pub use state::HandshakeState;
