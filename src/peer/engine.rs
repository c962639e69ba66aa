//! Peer connection engine abstraction
//!
//! The negotiation controller only drives the engine's control plane. The
//! webrtc-rs implementation lives in [`connection`](super::connection); tests
//! use [`MockEngine`](crate::mock::MockEngine).

use crate::error::EngineError;
use crate::event::EventQueue;
use crate::peer::media::LocalTrack;
use crate::peer::types::{IceCandidate, MediaSlot, ServerConfig, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PeerEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    /// Discard an outstanding local offer and return to the last stable state
    async fn rollback(&self) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Attach a track to a slot at call start
    async fn add_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError>;

    /// Swap the source of a slot, reusing the negotiated transport
    async fn replace_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError>;

    async fn sender_enabled(&self, slot: MediaSlot) -> Option<bool>;

    async fn set_sender_enabled(&self, slot: MediaSlot, enabled: bool) -> Result<(), EngineError>;

    async fn close(&self);
}

/// Creates one engine per session. Engine callbacks are delivered into `events`.
#[async_trait]
pub trait PeerEngineFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[ServerConfig],
        events: EventQueue,
    ) -> Result<Arc<dyn PeerEngine>, EngineError>;
}
