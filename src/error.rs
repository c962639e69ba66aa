//! Error taxonomy
//!
//! Every runtime failure is one of four kinds: transport, engine, protocol or
//! media. None of them ends the process; they are reported through the
//! [`EventSink`](crate::logger::EventSink) and the caller carries on.

use crate::negotiation::NegotiationState;
use crate::peer::types::MediaSlot;
use thiserror::Error;

/// Errors from the signaling channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Errors raised by the peer connection engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("failed to create peer connection: {0}")]
    Setup(String),
    #[error("createOffer failed: {0}")]
    CreateOffer(String),
    #[error("createAnswer failed: {0}")]
    CreateAnswer(String),
    #[error("setLocalDescription failed: {0}")]
    SetLocalDescription(String),
    #[error("setRemoteDescription failed: {0}")]
    SetRemoteDescription(String),
    #[error("rollback failed: {0}")]
    Rollback(String),
    #[error("addIceCandidate failed: {0}")]
    AddCandidate(String),
    #[error("{slot} track: {reason}")]
    Track { slot: MediaSlot, reason: String },
    #[error("no sender on {0} slot")]
    NoSender(MediaSlot),
    #[error("peer connection is closed")]
    Closed,
}

/// An envelope that does not fit the current negotiation state or cannot be read
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("answer received while {state}")]
    UnexpectedAnswer { state: NegotiationState },
    #[error("{0} description received in an offer envelope")]
    WrongDescriptionKind(String),
    #[error("username must be bound before sending {0}")]
    IdentityUnbound(&'static str),
    #[error("{0} envelope received with no active call")]
    NoActiveCall(&'static str),
    #[error("offer from {from} collided with our outstanding offer")]
    OfferCollision { from: String },
    #[error("no answer for offer #{offer_seq} within {secs}s")]
    AnswerTimeout { offer_seq: u64, secs: u64 },
}

/// Local media acquisition failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("{slot} device not found: {device}")]
    DeviceNotFound { slot: MediaSlot, device: String },
    #[error("{slot} capture failed: {reason}")]
    Acquire { slot: MediaSlot, reason: String },
}

/// Configuration loading and validation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("cannot parse config: {0}")]
    Parse(String),
    #[error("invalid ICE server {id}: {reason}")]
    IceServer { id: String, reason: String },
    #[error("invalid argument: {0}")]
    Argument(String),
}

/// Top-level error for the client API
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("call has ended")]
    CallEnded,
}

impl CallError {
    /// Short category name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Transport(_) => "transport",
            CallError::Engine(_) => "engine",
            CallError::Protocol(_) => "protocol",
            CallError::Media(_) => "media",
            CallError::Config(_) => "config",
            CallError::CallEnded => "call",
        }
    }
}
