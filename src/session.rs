//! Per-call state owned by the negotiation controller.

use crate::peer::engine::PeerEngine;
use crate::peer::media::{LocalTrack, MediaSource};
use crate::peer::types::{IceCandidate, MediaSlot, SessionDescription, SlotMap};
use crate::signaling::channel::SignalingChannel;
use crate::utils::random_id;
use std::sync::Arc;

/// What the session knows about one local media slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotState {
    pub enabled: bool,
    pub track_id: Option<String>,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            enabled: true,
            track_id: None,
        }
    }
}

/// One call: exactly one engine, the current descriptions and both
/// candidate sets. Created at call start, cleared at teardown.
pub struct Session {
    id: String,
    engine: Arc<dyn PeerEngine>,
    signaling: SignalingChannel,
    media: Arc<dyn MediaSource>,
    slots: SlotMap<SlotState>,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    local_candidates: Vec<IceCandidate>,
    remote_candidates: Vec<IceCandidate>,
    live: bool,
}

impl Session {
    pub fn new(
        engine: Arc<dyn PeerEngine>,
        signaling: SignalingChannel,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            id: random_id(),
            engine,
            signaling,
            media,
            slots: SlotMap::default(),
            local_description: None,
            remote_description: None,
            local_candidates: Vec::new(),
            remote_candidates: Vec::new(),
            live: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn engine(&self) -> &Arc<dyn PeerEngine> {
        &self.engine
    }

    pub fn signaling(&self) -> &SignalingChannel {
        &self.signaling
    }

    pub fn media(&self) -> &Arc<dyn MediaSource> {
        &self.media
    }

    pub fn slot(&self, slot: MediaSlot) -> &SlotState {
        &self.slots[slot]
    }

    /// Record the track now feeding `slot`
    pub fn attach(&mut self, slot: MediaSlot, track: &LocalTrack) {
        self.slots[slot] = SlotState {
            enabled: track.is_enabled(),
            track_id: Some(track.id.clone()),
        };
    }

    pub fn set_slot_enabled(&mut self, slot: MediaSlot, enabled: bool) {
        self.slots[slot].enabled = enabled;
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    /// Supersedes the current local description, returning the previous one
    pub fn set_local_description(&mut self, desc: SessionDescription) -> Option<SessionDescription> {
        self.local_description.replace(desc)
    }

    /// Put back the local description an abandoned offer replaced
    pub fn restore_local_description(&mut self, desc: Option<SessionDescription>) {
        self.local_description = desc;
    }

    pub fn set_remote_description(&mut self, desc: SessionDescription) -> Option<SessionDescription> {
        self.remote_description.replace(desc)
    }

    pub fn local_candidates(&self) -> &[IceCandidate] {
        &self.local_candidates
    }

    pub fn remote_candidates(&self) -> &[IceCandidate] {
        &self.remote_candidates
    }

    pub fn record_local_candidate(&mut self, candidate: IceCandidate) {
        self.local_candidates.push(candidate);
    }

    pub fn record_remote_candidate(&mut self, candidate: IceCandidate) {
        self.remote_candidates.push(candidate);
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Close the engine and drop all negotiated state
    pub async fn close(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.engine.close().await;
        self.local_description = None;
        self.remote_description = None;
        self.local_candidates.clear();
        self.remote_candidates.clear();
        self.slots = SlotMap::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::logger::EventSink;
    use crate::mock::{MockEngine, MockMedia, MockTransport};
    use tokio::sync::mpsc;

    fn session() -> (Session, Arc<MockEngine>) {
        let (queue, _rx) = mpsc::unbounded_channel();
        let engine = MockEngine::new(queue);
        let (sink, _events) = EventSink::new();
        let signaling = SignalingChannel::new(MockTransport::new(), Identity::new(), sink);
        (
            Session::new(engine.clone(), signaling, MockMedia::new()),
            engine,
        )
    }

    #[test]
    fn setting_a_description_supersedes_the_previous_one() {
        let (mut session, _) = session();
        assert_eq!(session.set_local_description(SessionDescription::offer("a")), None);
        let previous = session.set_local_description(SessionDescription::offer("b"));
        assert_eq!(previous.map(|d| d.body), Some("a".into()));
        assert_eq!(session.local_description().map(|d| d.body.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn close_clears_state_and_closes_engine() {
        let (mut session, engine) = session();
        session.set_remote_description(SessionDescription::answer("x"));
        session.record_remote_candidate(IceCandidate {
            candidate: "candidate:1".into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        });
        session.close().await;

        assert!(!session.is_live());
        assert!(engine.is_closed());
        assert!(session.remote_description().is_none());
        assert!(session.remote_candidates().is_empty());
    }
}
