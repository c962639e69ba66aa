#![allow(dead_code)]

use callsig_lib::config::NegotiationConfig;
use callsig_lib::event::{CallEvent, Command, EngineEvent, EventQueue, SessionEvent};
use callsig_lib::identity::Identity;
use callsig_lib::logger::EventSink;
use callsig_lib::mock::{MockEngine, MockMedia, MockTransport};
use callsig_lib::negotiation::{NegotiationController, NegotiationState};
use callsig_lib::peer::media::MediaSource;
use callsig_lib::peer::{MediaSlot, PeerEngine};
use callsig_lib::session::Session;
use callsig_lib::signaling::{InboundEnvelope, SignalingChannel};
use callsig_lib::CallError;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const REMOTE_FP: &str = "sha-256 AB:CD:EF:01";

pub fn remote_sdp(tag: &str) -> String {
    format!("v=0\r\no=remote 1 1 IN IP4 10.0.0.9\r\ns={tag}\r\na=fingerprint:{REMOTE_FP}\r\n")
}

pub fn offer_frame(sdp: &str, from: Option<&str>) -> String {
    let mut frame = json!({ "type": "offer", "offer": { "type": "offer", "sdp": sdp } });
    if let Some(from) = from {
        frame["username"] = json!(from);
    }
    frame.to_string()
}

pub fn answer_frame(sdp: &str) -> String {
    json!({ "type": "answer", "answer": { "type": "answer", "sdp": sdp } }).to_string()
}

pub fn candidate_frame(line: &str) -> String {
    json!({
        "type": "candidate",
        "candidate": { "candidate": line, "sdpMid": "0", "sdpMLineIndex": 0 }
    })
    .to_string()
}

pub struct Harness {
    pub controller: NegotiationController,
    pub queue: EventQueue,
    pub rx: mpsc::UnboundedReceiver<SessionEvent>,
    pub events: mpsc::UnboundedReceiver<CallEvent>,
    pub engine: Arc<MockEngine>,
    pub transport: Arc<MockTransport>,
    pub media: Arc<MockMedia>,
    pub signaling: SignalingChannel,
}

pub struct Setup {
    pub username: Option<&'static str>,
    pub tracks: bool,
    pub config: NegotiationConfig,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            username: Some("alice"),
            tracks: true,
            config: NegotiationConfig::default(),
        }
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(Setup::default()).await
    }

    /// Controller in `Idle` with no local tracks, so nothing is queued
    pub async fn idle() -> Self {
        Self::with(Setup {
            tracks: false,
            ..Setup::default()
        })
        .await
    }

    pub async fn with(setup: Setup) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let engine = MockEngine::new(queue.clone());
        let transport = MockTransport::new();
        let media = MockMedia::new();
        let (sink, events) = EventSink::new();
        let signaling = SignalingChannel::new(transport.clone(), Identity::new(), sink.clone());
        if let Some(name) = setup.username {
            signaling.bind_username(name).await;
        }
        transport.clear_sent();

        let mut session = Session::new(engine.clone(), signaling.clone(), media.clone());
        if setup.tracks {
            for slot in MediaSlot::ALL {
                let track = media.acquire(slot, None).await.unwrap();
                engine.add_track(slot, track.clone()).await.unwrap();
                session.attach(slot, &track);
            }
        }
        let controller = NegotiationController::new(session, setup.config, queue.clone(), sink);

        Self {
            controller,
            queue,
            rx,
            events,
            engine,
            transport,
            media,
            signaling,
        }
    }

    /// Dispatch everything queued, including events raised while dispatching
    pub async fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.controller.dispatch(event).await;
        }
    }

    pub async fn deliver(&mut self, frame: &str) {
        let envelope = InboundEnvelope::parse(frame).unwrap();
        self.controller.dispatch(SessionEvent::Inbound(envelope)).await;
        self.pump().await;
    }

    pub async fn command(&mut self, command: Command) {
        self.controller.dispatch(SessionEvent::Command(command)).await;
        self.pump().await;
    }

    pub async fn raise(&mut self, event: EngineEvent) {
        self.engine.raise(event);
        self.pump().await;
    }

    pub async fn fire(&mut self, event: SessionEvent) {
        self.controller.dispatch(event).await;
        self.pump().await;
    }

    pub fn state(&self) -> NegotiationState {
        self.controller.state()
    }

    /// Drives the initial offer and its answer
    pub async fn reach_stable(&mut self) {
        self.pump().await;
        assert_eq!(self.state(), NegotiationState::Offering);
        self.deliver(&answer_frame(&remote_sdp("answer"))).await;
        assert_eq!(self.state(), NegotiationState::Stable);
        self.transport.clear_sent();
        self.drain_events();
    }

    pub fn drain_events(&mut self) -> Vec<CallEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn errors(&mut self) -> Vec<CallError> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                CallEvent::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.transport.sent_envelopes()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.transport.sent_types()
    }
}
