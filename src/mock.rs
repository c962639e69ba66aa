//! Mock implementations for testing
//!
//! In-memory relay transport, peer connection engine and media source. The
//! engine records every control-plane call so tests can assert on what the
//! controller asked for.

use crate::error::{EngineError, MediaError, TransportError};
use crate::event::{EngineEvent, EventQueue, SessionEvent};
use crate::peer::engine::{PeerEngine, PeerEngineFactory};
use crate::peer::media::{LocalTrack, MediaSource};
use crate::peer::types::{
    IceCandidate, MediaSlot, SdpKind, ServerConfig, SessionDescription, SlotMap,
};
use crate::signaling::transport::{LinkState, RelayTransport};
use crate::utils::lock;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

// ============================================================================
// Mock Relay Transport
// ============================================================================

/// Relay transport that records outbound frames and replays injected ones
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    state: watch::Sender<LinkState>,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(LinkState::Open);
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: AsyncMutex::new(rx),
            state,
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Deliver a frame as if the relay had sent it
    pub fn push_inbound(&self, frame: impl Into<String>) {
        if let Some(tx) = lock(&self.inbound_tx).as_ref() {
            let _ = tx.send(frame.into());
        }
    }

    /// Simulate the relay dropping the connection
    pub fn drop_link(&self) {
        lock(&self.inbound_tx).take();
        self.state.send_replace(LinkState::Closed);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Sent frames parsed as JSON
    pub fn sent_envelopes(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// `type` tags of the sent frames, in order
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_envelopes()
            .iter()
            .filter_map(|v| v["type"].as_str().map(str::to_owned))
            .collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if *self.state.borrow() == LinkState::Closed {
            return Err(TransportError::NotConnected);
        }
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(TransportError::SendFailed("mock send failure".into()));
        }
        lock(&self.sent).push(frame);
        Ok(())
    }

    async fn recv(&self) -> Option<String> {
        self.inbound_rx.lock().await.recv().await
    }

    fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    async fn close(&self) {
        self.drop_link();
    }
}

// ============================================================================
// Mock Peer Connection Engine
// ============================================================================

/// Which engine operations should fail
#[derive(Debug, Default, Clone)]
pub struct MockFailures {
    pub create_offer: bool,
    pub create_answer: bool,
    pub set_local: bool,
    pub set_remote: bool,
    pub add_candidate: bool,
    pub replace_track: bool,
}

/// Engine that fabricates descriptions and raises events like a browser would
pub struct MockEngine {
    events: EventQueue,
    fingerprint: String,
    offers: AtomicUsize,
    answers: AtomicUsize,
    rollbacks: AtomicUsize,
    replaced: AtomicUsize,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
    /// Local and remote descriptions from before the offer in flight
    rollback_point: Mutex<Option<(Option<SessionDescription>, Option<SessionDescription>)>>,
    candidates: Mutex<Vec<IceCandidate>>,
    tracks: Mutex<SlotMap<Option<LocalTrack>>>,
    needs_negotiation: AtomicBool,
    renegotiate_on_replace: AtomicBool,
    closed: AtomicBool,
    failures: Mutex<MockFailures>,
}

impl MockEngine {
    pub fn new(events: EventQueue) -> Arc<Self> {
        Arc::new(Self {
            events,
            fingerprint: crate::utils::random_id(),
            offers: AtomicUsize::new(0),
            answers: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            replaced: AtomicUsize::new(0),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            rollback_point: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            tracks: Mutex::new(SlotMap::default()),
            needs_negotiation: AtomicBool::new(false),
            renegotiate_on_replace: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            failures: Mutex::new(MockFailures::default()),
        })
    }

    pub fn set_failures(&self, failures: MockFailures) {
        *lock(&self.failures) = failures;
    }

    /// Raise negotiation-needed whenever a track is replaced
    pub fn set_renegotiate_on_replace(&self, on: bool) {
        self.renegotiate_on_replace.store(on, Ordering::Relaxed);
    }

    /// Raise an engine event by hand
    pub fn raise(&self, event: EngineEvent) {
        let _ = self.events.send(SessionEvent::Engine(event));
    }

    pub fn offers_created(&self) -> usize {
        self.offers.load(Ordering::Relaxed)
    }

    pub fn answers_created(&self) -> usize {
        self.answers.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::Relaxed)
    }

    pub fn tracks_replaced(&self) -> usize {
        self.replaced.load(Ordering::Relaxed)
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        lock(&self.local).clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        lock(&self.remote).clone()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        lock(&self.candidates).clone()
    }

    pub fn track(&self, slot: MediaSlot) -> Option<LocalTrack> {
        lock(&self.tracks)[slot].clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn failures(&self) -> MockFailures {
        lock(&self.failures).clone()
    }

    fn check_open(&self) -> Result<(), EngineError> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn sdp(&self, role: &str, n: usize) -> String {
        format!(
            "v=0\r\no=mock {n} 1 IN IP4 127.0.0.1\r\ns={role}\r\na=fingerprint:sha-256 {}\r\n",
            self.fingerprint
        )
    }

    /// An offer opens an exchange that rollback can undo; an answer closes it.
    fn track_exchange(&self, desc: &SessionDescription) {
        let mut point = lock(&self.rollback_point);
        match desc.kind {
            SdpKind::Offer => {
                if point.is_none() {
                    *point = Some((self.local_description(), self.remote_description()));
                }
            }
            SdpKind::Answer => *point = None,
        }
    }

    /// Browsers coalesce negotiation-needed until the next offer is created.
    fn flag_negotiation(&self) {
        if !self.needs_negotiation.swap(true, Ordering::Relaxed) {
            self.raise(EngineEvent::NegotiationNeeded);
        }
    }
}

#[async_trait]
impl PeerEngine for MockEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        self.check_open()?;
        if self.failures().create_offer {
            return Err(EngineError::CreateOffer("mock failure".into()));
        }
        self.needs_negotiation.store(false, Ordering::Relaxed);
        let n = self.offers.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(SessionDescription::offer(self.sdp("offer", n)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.check_open()?;
        if self.failures().create_answer {
            return Err(EngineError::CreateAnswer("mock failure".into()));
        }
        let n = self.answers.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(SessionDescription::answer(self.sdp("answer", n)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.check_open()?;
        if self.failures().set_local {
            return Err(EngineError::SetLocalDescription("mock failure".into()));
        }
        self.track_exchange(&desc);
        *lock(&self.local) = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.check_open()?;
        if self.failures().set_remote {
            return Err(EngineError::SetRemoteDescription("mock failure".into()));
        }
        self.track_exchange(&desc);
        *lock(&self.remote) = Some(desc);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), EngineError> {
        self.check_open()?;
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        if let Some((local, remote)) = lock(&self.rollback_point).take() {
            *lock(&self.local) = local;
            *lock(&self.remote) = remote;
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.check_open()?;
        if self.failures().add_candidate {
            return Err(EngineError::AddCandidate("mock failure".into()));
        }
        lock(&self.candidates).push(candidate);
        Ok(())
    }

    async fn add_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError> {
        self.check_open()?;
        lock(&self.tracks)[slot] = Some(track);
        self.flag_negotiation();
        Ok(())
    }

    async fn replace_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError> {
        self.check_open()?;
        if self.failures().replace_track {
            return Err(EngineError::Track {
                slot,
                reason: "mock failure".into(),
            });
        }
        {
            let mut tracks = lock(&self.tracks);
            if tracks[slot].is_none() {
                return Err(EngineError::NoSender(slot));
            }
            tracks[slot] = Some(track);
        }
        self.replaced.fetch_add(1, Ordering::Relaxed);
        if self.renegotiate_on_replace.load(Ordering::Relaxed) {
            self.flag_negotiation();
        }
        Ok(())
    }

    async fn sender_enabled(&self, slot: MediaSlot) -> Option<bool> {
        lock(&self.tracks)[slot].as_ref().map(LocalTrack::is_enabled)
    }

    async fn set_sender_enabled(&self, slot: MediaSlot, enabled: bool) -> Result<(), EngineError> {
        let tracks = lock(&self.tracks);
        let track = tracks[slot].as_ref().ok_or(EngineError::NoSender(slot))?;
        track.set_enabled(enabled);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

/// Factory handing out [`MockEngine`]s and remembering the last one
#[derive(Default)]
pub struct MockEngineFactory {
    last: Mutex<Option<Arc<MockEngine>>>,
    fail: AtomicBool,
}

impl MockEngineFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Option<Arc<MockEngine>> {
        lock(&self.last).clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl PeerEngineFactory for MockEngineFactory {
    async fn create(
        &self,
        _ice_servers: &[ServerConfig],
        events: EventQueue,
    ) -> Result<Arc<dyn PeerEngine>, EngineError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(EngineError::Setup("mock failure".into()));
        }
        let engine = MockEngine::new(events);
        *lock(&self.last) = Some(engine.clone());
        Ok(engine)
    }
}

// ============================================================================
// Mock Media Source
// ============================================================================

/// Media source producing detached tracks; devices named in `missing` fail
#[derive(Default)]
pub struct MockMedia {
    missing: Mutex<Vec<String>>,
    acquired: AtomicUsize,
}

impl MockMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_missing(&self, device: &str) {
        lock(&self.missing).push(device.to_string());
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MediaSource for MockMedia {
    async fn acquire(&self, slot: MediaSlot, device: Option<&str>) -> Result<LocalTrack, MediaError> {
        if let Some(device) = device {
            if lock(&self.missing).iter().any(|d| d == device) {
                return Err(MediaError::DeviceNotFound {
                    slot,
                    device: device.to_string(),
                });
            }
        }
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(LocalTrack::detached(slot, device.map(str::to_owned)))
    }
}
