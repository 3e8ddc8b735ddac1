// Domain-level errors for the radio link and its wire format.

use uuid::Uuid;

use crate::domain::state::LinkState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("no peer offers service {0}")]
    PeerNotFound(Uuid),
    #[error("transport connect failed: {0}")]
    Connect(String),
    #[error("service {0} missing on peer")]
    ServiceMissing(Uuid),
    #[error("characteristic {0} missing on service")]
    CharacteristicMissing(Uuid),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("disconnect failed: {0}")]
    Disconnect(String),
    #[error("another link transition is in flight")]
    TransitionInFlight,
    #[error("operation not valid while {0:?}")]
    InvalidState(LinkState),
    // The transport dropped while a transition was running.
    #[error("link lost during transition")]
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("turn sign byte must be 0 or 1, got {0}")]
    TurnSign(u8),
}
