//! Handshake coordinator actor.
//!
//! All state transitions happen on one task that owns the state machine, the
//! in-flight [`Delivery`] and a single timer slot. Callers talk to it through
//! [`HandshakeCoordinator`], which sends events over an mpsc channel and reads
//! the published state through an `Arc<RwLock<_>>`.
//!
//! # Ordering
//!
//! The kubeconfig push only starts after the token push is acknowledged, and
//! an acknowledgment only counts when it matches the awaited kind.
//!
//! # Timers
//!
//! At most one timer is armed: the ack timeout, the retry backoff, the refresh
//! interval or an immediate restart. Arming a timer replaces the previous one,
//! and a surface teardown discards it.

use crate::credentials::CredentialProvider;
use crate::error::HandshakeError;
use crate::handshake::channel::{ConfigSource, Notification, Notifier, SurfaceChannel};
use crate::handshake::consent::{ConsentRecord, ConsentStore};
use crate::handshake::delivery::{Delivery, PayloadKind, RetryPolicy, TimeoutOutcome};
use crate::handshake::messages::{Envelope, MessageType};
use crate::handshake::state::HandshakeState;

use common::RedactedToken;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::{Sleep, sleep};
use url::Url;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const SUCCESS_MESSAGE: &str = "Headlamp is signed in with your credentials";

/// Normalise a surface URL or origin to its `scheme://host[:port]` form.
pub fn normalize_origin(raw: &str) -> Result<String, HandshakeError> {
    let url = Url::parse(raw).map_err(|e| HandshakeError::origin(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HandshakeError::origin(format!(
                "{raw}: unsupported scheme '{other}'"
            )));
        }
    }

    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(HandshakeError::origin(format!("{raw}: opaque origin")));
    }

    Ok(origin.ascii_serialization())
}

/// Collaborators the coordinator needs.
#[derive(Clone)]
pub struct HandshakeDeps {
    pub credentials: Arc<dyn CredentialProvider>,
    pub config: Arc<dyn ConfigSource>,
    pub channel: Arc<dyn SurfaceChannel>,
    pub notifier: Arc<dyn Notifier>,
    pub consent: Arc<dyn ConsentStore>,
}

#[derive(Debug)]
enum HandshakeEvent {
    SurfaceReady { origin: String },
    Message { origin: String, data: Value },
    Consent { allow: bool, remember: bool },
    TokenChanged(RedactedToken),
    Retry,
    TornDown,
    Flush(oneshot::Sender<()>),
    Dispose,
}

/// Handle to the coordinator actor. Cloning shares the same actor.
#[derive(Clone)]
pub struct HandshakeCoordinator {
    events: mpsc::Sender<HandshakeEvent>,
    state: Arc<RwLock<HandshakeState>>,
}

impl HandshakeCoordinator {
    pub fn spawn(deps: HandshakeDeps) -> Self {
        Self::spawn_with_policy(deps, RetryPolicy::default())
    }

    pub fn spawn_with_policy(deps: HandshakeDeps, policy: RetryPolicy) -> Self {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(RwLock::new(HandshakeState::Idle));

        let actor = Actor {
            deps,
            policy,
            shared_state: Arc::clone(&state),
            current: HandshakeState::Idle,
            origin: None,
            delivery: None,
            timer: None,
            cycle: None,
            delivered_token: None,
            in_flight_token: None,
            rotation_pending: false,
        };

        TokioSpawn(actor.run(rx));

        Self { events, state }
    }

    async fn send(&self, event: HandshakeEvent) -> Result<(), HandshakeError> {
        self.events
            .send(event)
            .await
            .map_err(|_| HandshakeError::stopped())
    }

    /// The surface finished loading at `origin` (a URL or origin string).
    pub async fn surface_ready(&self, origin: &str) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::SurfaceReady {
            origin: origin.to_string(),
        })
        .await
    }

    /// Inbound message from the surface's context.
    pub async fn message(&self, origin: &str, data: Value) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::Message {
            origin: origin.to_string(),
            data,
        })
        .await
    }

    pub async fn consent(&self, allow: bool, remember: bool) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::Consent { allow, remember }).await
    }

    /// The host's identity token changed.
    pub async fn token_changed(&self, token: RedactedToken) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::TokenChanged(token)).await
    }

    /// Manual retry; only acts from `Failed`.
    pub async fn retry(&self) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::Retry).await
    }

    pub async fn torn_down(&self) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::TornDown).await
    }

    /// Wait until every event sent before this call has been handled.
    pub async fn flush(&self) -> Result<(), HandshakeError> {
        let (tx, rx) = oneshot::channel();
        self.send(HandshakeEvent::Flush(tx)).await?;
        rx.await.map_err(|_| HandshakeError::stopped())
    }

    /// Stop the actor. Later calls return [`HandshakeError::Stopped`].
    pub async fn dispose(&self) -> Result<(), HandshakeError> {
        self.send(HandshakeEvent::Dispose).await
    }

    pub async fn state(&self) -> HandshakeState {
        *self.state.read().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    AckTimeout,
    Backoff,
    Refresh,
    Restart,
}

struct Timer {
    kind: TimerKind,
    sleep: Pin<Box<Sleep>>,
}

/// Resolves when the armed timer fires; pending forever when none is armed.
async fn next_timer(timer: &mut Option<Timer>) -> TimerKind {
    match timer {
        Some(t) => {
            t.sleep.as_mut().await;
            let kind = t.kind;
            *timer = None;
            kind
        }
        None => std::future::pending().await,
    }
}

/// One handshake cycle: from surface ready or manual retry until the next one.
#[derive(Debug)]
struct Cycle {
    id: Uuid,
    notified: bool,
}

impl Cycle {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            notified: false,
        }
    }
}

struct Actor {
    deps: HandshakeDeps,
    policy: RetryPolicy,
    shared_state: Arc<RwLock<HandshakeState>>,
    current: HandshakeState,
    origin: Option<String>,
    delivery: Option<Delivery>,
    timer: Option<Timer>,
    cycle: Option<Cycle>,
    delivered_token: Option<RedactedToken>,
    in_flight_token: Option<RedactedToken>,
    rotation_pending: bool,
}

impl Actor {
    async fn run(mut self, mut events: mpsc::Receiver<HandshakeEvent>) {
        info!("Handshake coordinator started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(HandshakeEvent::Dispose) | None => break,
                        Some(event) => self.handle_event(event).await,
                    }
                }
                kind = next_timer(&mut self.timer) => self.handle_timer(kind).await,
            }
        }

        self.timer = None;
        info!("Handshake coordinator stopped");
    }

    fn tag(&self) -> String {
        match &self.cycle {
            Some(cycle) => cycle.id.simple().to_string()[..8].to_string(),
            None => String::from("--------"),
        }
    }

    async fn set_state(&mut self, state: HandshakeState) {
        if self.current != state {
            debug!("[{}] {:?} -> {:?}", self.tag(), self.current, state);
        }
        self.current = state;
        *self.shared_state.write().await = state;
    }

    fn arm(&mut self, kind: TimerKind, after: Duration) {
        self.timer = Some(Timer {
            kind,
            sleep: Box::pin(sleep(after)),
        });
    }

    fn reset(&mut self) {
        self.timer = None;
        self.delivery = None;
        self.in_flight_token = None;
        self.rotation_pending = false;
    }

    fn notify_error(&self, error: &HandshakeError) {
        self.deps.notifier.notify(Notification::Error {
            message: error.user_message(),
        });
    }

    async fn handle_event(&mut self, event: HandshakeEvent) {
        match event {
            HandshakeEvent::SurfaceReady { origin } => self.on_surface_ready(&origin).await,
            HandshakeEvent::Message { origin, data } => self.on_message(&origin, &data).await,
            HandshakeEvent::Consent { allow, remember } => self.on_consent(allow, remember).await,
            HandshakeEvent::TokenChanged(token) => self.on_token_changed(token).await,
            HandshakeEvent::Retry => self.on_retry().await,
            HandshakeEvent::TornDown => self.on_torn_down().await,
            HandshakeEvent::Flush(reply) => {
                let _ = reply.send(());
            }
            HandshakeEvent::Dispose => {}
        }
    }

    async fn handle_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::AckTimeout => self.on_ack_timeout().await,
            TimerKind::Backoff => self.post_attempt().await,
            TimerKind::Refresh => self.on_refresh().await,
            TimerKind::Restart => self.begin_push().await,
        }
    }

    async fn on_surface_ready(&mut self, raw_origin: &str) {
        let origin = match normalize_origin(raw_origin) {
            Ok(origin) => origin,
            Err(e) => {
                warn!("Ignoring surface with invalid origin: {e}");
                self.notify_error(&e);
                return;
            }
        };

        self.reset();
        self.origin = Some(origin.clone());
        self.cycle = Some(Cycle::new());
        info!("[{}] Surface ready at {origin}", self.tag());

        match self.deps.consent.load() {
            Ok(Some(record)) if record.remember && record.allowed => {
                debug!("[{}] Using remembered consent", self.tag());
                self.begin_push().await;
            }
            Ok(Some(record)) if record.remember => {
                info!(
                    "[{}] Credential sharing previously declined, not sending",
                    self.tag()
                );
                self.set_state(HandshakeState::Idle).await;
            }
            Ok(_) => self.prompt_consent(&origin).await,
            Err(e) => {
                warn!("[{}] Could not read consent: {e}", self.tag());
                self.notify_error(&e);
                self.prompt_consent(&origin).await;
            }
        }
    }

    async fn prompt_consent(&mut self, origin: &str) {
        self.set_state(HandshakeState::AwaitingConsent).await;
        self.deps.notifier.request_consent(origin);
    }

    async fn on_consent(&mut self, allow: bool, remember: bool) {
        if remember
            && let Err(e) = self.deps.consent.save(&ConsentRecord::new(allow, remember))
        {
            warn!("[{}] Could not save consent: {e}", self.tag());
            self.notify_error(&e);
        }

        if self.current != HandshakeState::AwaitingConsent {
            debug!(
                "[{}] Consent decision in state {:?}, nothing to start",
                self.tag(),
                self.current
            );
            return;
        }

        if allow {
            info!("[{}] Credential sharing allowed", self.tag());
            self.begin_push().await;
        } else {
            info!("[{}] Credential sharing declined", self.tag());
            self.set_state(HandshakeState::Idle).await;
        }
    }

    /// Start a token push followed by a kubeconfig push.
    async fn begin_push(&mut self) {
        if self.origin.is_none() {
            debug!("No surface loaded, push skipped");
            return;
        }

        self.timer = None;
        self.rotation_pending = false;
        self.delivery = Some(Delivery::new(PayloadKind::Token));
        self.post_attempt().await;
    }

    async fn prepare(&mut self, kind: PayloadKind) -> Result<Envelope, HandshakeError> {
        match kind {
            PayloadKind::Token => {
                let token = self
                    .deps
                    .credentials
                    .identity_token()
                    .await
                    .map_err(|e| HandshakeError::credential(e.to_string()))?;
                let envelope = Envelope::auth_token(token.expose());
                self.in_flight_token = Some(token);
                Ok(envelope)
            }
            PayloadKind::Kubeconfig => {
                let document = self.deps.config.kubeconfig().await?;
                Ok(Envelope::kubeconfig(&document))
            }
        }
    }

    /// Post the current delivery's payload once and arm the ack timeout.
    async fn post_attempt(&mut self) {
        let Some(kind) = self.delivery.as_ref().map(|d| d.kind) else {
            return;
        };
        let Some(origin) = self.origin.clone() else {
            return;
        };

        self.set_state(HandshakeState::sending(kind)).await;

        let envelope = match self.prepare(kind).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.fail(kind, e).await;
                return;
            }
        };

        let Some(attempt) = self.delivery.as_mut().map(Delivery::record_post) else {
            return;
        };

        if let Err(e) = self.deps.channel.post(&envelope, &origin).await {
            warn!("[{}] Posting {} failed: {e}", self.tag(), kind.label());
        }

        info!(
            "[{}] Sent {} (attempt {attempt}/{})",
            self.tag(),
            kind.label(),
            self.policy.max_attempts
        );

        self.set_state(HandshakeState::awaiting(kind)).await;
        self.arm(TimerKind::AckTimeout, self.policy.ack_timeout);
    }

    async fn fail(&mut self, kind: PayloadKind, error: HandshakeError) {
        let attempt = self.delivery.as_ref().map_or(0, |d| d.attempt);
        self.delivery = None;
        self.in_flight_token = None;
        self.timer = None;

        error!("[{}] Handshake failed: {error}", self.tag());
        self.set_state(HandshakeState::Failed { kind, attempt }).await;
        self.notify_error(&error);

        if self.rotation_pending {
            self.rotation_pending = false;
            info!("[{}] Retrying once with the rotated token", self.tag());
            self.arm(TimerKind::Restart, Duration::ZERO);
        }
    }

    async fn on_ack_timeout(&mut self) {
        let Some(delivery) = self.delivery.as_mut() else {
            return;
        };
        let kind = delivery.kind;
        let attempt = delivery.attempt;
        let outcome = delivery.on_timeout(&self.policy);

        match outcome {
            TimeoutOutcome::Retry => {
                warn!(
                    "[{}] No {} acknowledgment after attempt {attempt}, retrying in {:?}",
                    self.tag(),
                    kind.label(),
                    self.policy.backoff
                );
                self.set_state(HandshakeState::sending(kind)).await;
                self.arm(TimerKind::Backoff, self.policy.backoff);
            }
            TimeoutOutcome::Exhausted => {
                self.fail(kind, HandshakeError::timeout(kind.label(), attempt))
                    .await;
            }
        }
    }

    async fn on_message(&mut self, raw_origin: &str, data: &Value) {
        let Some(expected) = self.origin.as_deref() else {
            debug!("Ignoring message with no surface loaded");
            return;
        };

        match normalize_origin(raw_origin) {
            Ok(origin) if origin == expected => {}
            _ => {
                debug!("Ignoring message from unexpected origin {raw_origin}");
                return;
            }
        }

        let Some(envelope) = Envelope::parse(data) else {
            debug!("Ignoring message that is not an envelope");
            return;
        };

        match envelope.kind {
            MessageType::Redirect => match envelope.redirect_path() {
                Some(path) if path.starts_with('/') && !path.starts_with("//") => {
                    info!("[{}] Surface requested navigation to {path}", self.tag());
                    self.deps.notifier.navigate(path);
                }
                other => debug!("Ignoring redirect to {other:?}"),
            },
            MessageType::AuthTokenAck | MessageType::KubeconfigAck => {
                self.on_ack(envelope.kind).await;
            }
            MessageType::AuthToken | MessageType::Kubeconfig => {
                debug!("Ignoring {:?} sent by the surface", envelope.kind);
            }
        }
    }

    async fn on_ack(&mut self, message: MessageType) {
        let acked = self
            .delivery
            .as_mut()
            .is_some_and(|d| d.acknowledge(message));

        if !acked {
            debug!(
                "[{}] Ignoring {message:?} in state {:?}",
                self.tag(),
                self.current
            );
            return;
        }

        self.timer = None;
        let Some(delivery) = self.delivery.take() else {
            return;
        };

        match delivery.kind {
            PayloadKind::Token => {
                self.delivered_token = self.in_flight_token.take();
                info!(
                    "[{}] Token acknowledged after {} attempt(s)",
                    self.tag(),
                    delivery.attempt
                );
                self.delivery = Some(Delivery::new(PayloadKind::Kubeconfig));
                self.post_attempt().await;
            }
            PayloadKind::Kubeconfig => {
                info!(
                    "[{}] Kubeconfig acknowledged after {} attempt(s)",
                    self.tag(),
                    delivery.attempt
                );
                self.set_state(HandshakeState::Complete).await;
                self.notify_success_once();
                self.arm(TimerKind::Refresh, self.policy.refresh_interval);

                if self.rotation_pending {
                    info!("[{}] Token rotated during push, sending again", self.tag());
                    self.begin_push().await;
                }
            }
        }
    }

    fn notify_success_once(&mut self) {
        if let Some(cycle) = self.cycle.as_mut()
            && !cycle.notified
        {
            cycle.notified = true;
            self.deps.notifier.notify(Notification::Success {
                message: SUCCESS_MESSAGE.to_string(),
            });
        }
    }

    async fn on_refresh(&mut self) {
        if self.current != HandshakeState::Complete {
            return;
        }

        if let Err(e) = self.deps.config.refresh_server().await {
            warn!("[{}] Server-side kubeconfig refresh failed: {e}", self.tag());
        }

        debug!("[{}] Refreshing credentials", self.tag());
        self.begin_push().await;
    }

    async fn on_token_changed(&mut self, token: RedactedToken) {
        if self.delivered_token.as_ref() == Some(&token) {
            debug!("[{}] Token unchanged", self.tag());
            return;
        }

        match self.current {
            HandshakeState::Complete | HandshakeState::Failed { .. } => {
                info!("[{}] Token rotated, sending again", self.tag());
                self.begin_push().await;
            }
            state if state.is_in_flight() => {
                if self.in_flight_token.as_ref() != Some(&token) {
                    debug!("[{}] Token rotated mid-push, queueing follow-up", self.tag());
                    self.rotation_pending = true;
                }
            }
            _ => debug!("[{}] Token changed before any push", self.tag()),
        }
    }

    async fn on_retry(&mut self) {
        if !matches!(self.current, HandshakeState::Failed { .. }) {
            debug!("[{}] Retry ignored in state {:?}", self.tag(), self.current);
            return;
        }

        self.cycle = Some(Cycle::new());
        info!("[{}] Manual retry", self.tag());
        self.begin_push().await;
    }

    async fn on_torn_down(&mut self) {
        info!("[{}] Surface torn down", self.tag());
        self.reset();
        self.origin = None;
        self.cycle = None;
        self.set_state(HandshakeState::Idle).await;
    }
}
