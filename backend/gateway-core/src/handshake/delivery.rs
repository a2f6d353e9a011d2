//! Deliver-with-acknowledgment bookkeeping shared by token and kubeconfig pushes.

use crate::handshake::messages::MessageType;

use std::time::Duration;

pub const ACK_TIMEOUT: Duration = Duration::from_secs(30);
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);
pub const MAX_RETRY_ATTEMPTS: u32 = 3;
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Token,
    Kubeconfig,
}

impl PayloadKind {
    pub fn message_type(self) -> MessageType {
        match self {
            PayloadKind::Token => MessageType::AuthToken,
            PayloadKind::Kubeconfig => MessageType::Kubeconfig,
        }
    }

    pub fn ack_type(self) -> MessageType {
        match self {
            PayloadKind::Token => MessageType::AuthTokenAck,
            PayloadKind::Kubeconfig => MessageType::KubeconfigAck,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PayloadKind::Token => "token",
            PayloadKind::Kubeconfig => "kubeconfig",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Acked,
    Failed,
}

/// Timing of one handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub ack_timeout: Duration,
    pub backoff: Duration,
    pub max_attempts: u32,
    pub refresh_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ack_timeout: ACK_TIMEOUT,
            backoff: RETRY_BACKOFF,
            max_attempts: MAX_RETRY_ATTEMPTS,
            refresh_interval: REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// Another post is allowed after the backoff.
    Retry,
    /// `max_attempts` posts went unacknowledged.
    Exhausted,
}

/// One credential push. Terminal once acked or failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub kind: PayloadKind,
    pub attempt: u32,
    pub state: DeliveryState,
}

impl Delivery {
    pub fn new(kind: PayloadKind) -> Self {
        Self {
            kind,
            attempt: 0,
            state: DeliveryState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }

    /// Count a post. Returns the attempt number just made.
    pub fn record_post(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Accept `message` as the acknowledgment if it is the one awaited.
    pub fn acknowledge(&mut self, message: MessageType) -> bool {
        if self.is_pending() && message == self.kind.ack_type() {
            self.state = DeliveryState::Acked;
            return true;
        }
        false
    }

    pub fn on_timeout(&mut self, policy: &RetryPolicy) -> TimeoutOutcome {
        if self.attempt >= policy.max_attempts {
            self.state = DeliveryState::Failed;
            TimeoutOutcome::Exhausted
        } else {
            TimeoutOutcome::Retry
        }
    }
}
