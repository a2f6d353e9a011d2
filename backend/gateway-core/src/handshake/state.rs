use crate::handshake::delivery::PayloadKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    AwaitingConsent,
    SendingToken,
    AwaitingTokenAck,
    SendingConfig,
    AwaitingConfigAck,
    Complete,
    Failed {
        kind: PayloadKind,
        attempt: u32,
    },
}

impl HandshakeState {
    pub fn sending(kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::Token => HandshakeState::SendingToken,
            PayloadKind::Kubeconfig => HandshakeState::SendingConfig,
        }
    }

    pub fn awaiting(kind: PayloadKind) -> Self {
        match kind {
            PayloadKind::Token => HandshakeState::AwaitingTokenAck,
            PayloadKind::Kubeconfig => HandshakeState::AwaitingConfigAck,
        }
    }

    /// A push is between its first post and its final ack or failure.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            HandshakeState::SendingToken
                | HandshakeState::AwaitingTokenAck
                | HandshakeState::SendingConfig
                | HandshakeState::AwaitingConfigAck
        )
    }
}
