//! Events flowing through a session's dispatch queue and out to the UI.

use crate::error::CallError;
use crate::negotiation::NegotiationState;
use crate::peer::types::{IceCandidate, MediaSlot, PeerLinkState, RemoteTrack};
use crate::signaling::envelope::InboundEnvelope;
use tokio::sync::mpsc;

/// Sender half of a session's serialized event queue
pub type EventQueue = mpsc::UnboundedSender<SessionEvent>;

/// Everything a session reacts to, in delivery order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Parsed envelope from the signaling relay
    Inbound(InboundEnvelope),
    /// Asynchronous notification from the peer connection engine
    Engine(EngineEvent),
    /// Request from the UI
    Command(Command),
    /// Timer armed when offer number `offer_seq` was sent
    AnswerTimeout { offer_seq: u64 },
    /// Signaling relay went away
    TransportClosed,
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    NegotiationNeeded,
    /// `None` marks the end of local candidate gathering
    LocalCandidate(Option<IceCandidate>),
    RemoteTrack(RemoteTrack),
    ConnectionState(PeerLinkState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleMute(MediaSlot),
    SetMuted { slot: MediaSlot, muted: bool },
    /// `None` selects the default device
    ChangeSource {
        slot: MediaSlot,
        device: Option<String>,
    },
    HangUp,
}

/// Notifications for the UI collaborator
#[derive(Debug, Clone)]
pub enum CallEvent {
    State(NegotiationState),
    RemoteTrack(RemoteTrack),
    Muted { slot: MediaSlot, muted: bool },
    Negotiated { fingerprint: Option<String> },
    Connection(PeerLinkState),
    Error(CallError),
    Ended { reason: String },
}
