//! The offer/answer state machine.
//!
//! One controller per session. Every input (engine callback, inbound
//! envelope, UI command, timer) arrives as a [`SessionEvent`] and is handled
//! to completion before the next one is taken, so transitions never
//! interleave. At most one offer/answer exchange is in flight; a
//! renegotiation requested meanwhile is remembered and started on the next
//! entry into `Stable`.

use crate::config::{GlarePolicy, NegotiationConfig};
use crate::error::{EngineError, ProtocolError};
use crate::event::{CallEvent, Command, EngineEvent, EventQueue, SessionEvent};
use crate::logger::{dump_candidate, EventSink};
use crate::negotiation::state::NegotiationState;
use crate::peer::engine::PeerEngine;
use crate::peer::fingerprint::session_fingerprint;
use crate::peer::ice::analyze_candidates;
use crate::peer::types::{IceCandidate, MediaSlot, SdpKind, SessionDescription};
use crate::session::Session;
use crate::signaling::envelope::{Inbound, InboundEnvelope, Outbound};
use log::{debug, info, warn};

pub struct NegotiationController {
    session: Session,
    state: NegotiationState,
    /// State to fall back to when an outstanding offer is abandoned
    settled: NegotiationState,
    pending_renegotiation: bool,
    offer_seq: u64,
    /// Local description the outstanding offer replaced
    offer_backup: Option<SessionDescription>,
    config: NegotiationConfig,
    queue: EventQueue,
    sink: EventSink,
}

impl NegotiationController {
    pub fn new(
        session: Session,
        config: NegotiationConfig,
        queue: EventQueue,
        sink: EventSink,
    ) -> Self {
        Self {
            session,
            state: NegotiationState::Idle,
            settled: NegotiationState::Idle,
            pending_renegotiation: false,
            offer_seq: 0,
            offer_backup: None,
            config,
            queue,
            sink,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Number of offers sent so far; also the tag of the latest one
    pub fn offer_seq(&self) -> u64 {
        self.offer_seq
    }

    pub fn has_pending_renegotiation(&self) -> bool {
        self.pending_renegotiation
    }

    pub async fn dispatch(&mut self, event: SessionEvent) {
        if self.state == NegotiationState::Closed {
            debug!("Session {} closed, ignoring {:?}", self.session.id(), event);
            return;
        }

        match event {
            SessionEvent::Engine(EngineEvent::NegotiationNeeded) => self.on_negotiation_needed().await,
            SessionEvent::Engine(EngineEvent::LocalCandidate(candidate)) => {
                self.on_local_candidate(candidate).await
            }
            SessionEvent::Engine(EngineEvent::RemoteTrack(track)) => {
                self.sink.emit(CallEvent::RemoteTrack(track))
            }
            SessionEvent::Engine(EngineEvent::ConnectionState(state)) => {
                self.sink.emit(CallEvent::Connection(state))
            }
            SessionEvent::Inbound(envelope) => self.on_inbound(envelope).await,
            SessionEvent::Command(command) => self.on_command(command).await,
            SessionEvent::AnswerTimeout { offer_seq } => self.on_answer_timeout(offer_seq).await,
            SessionEvent::TransportClosed => self.teardown("signaling connection lost").await,
        }
    }

    fn set_state(&mut self, state: NegotiationState) {
        if self.state == state {
            return;
        }
        info!("Session {}: {} -> {}", self.session.id(), self.state, state);
        self.state = state;
        self.sink.emit(CallEvent::State(state));
    }

    // ---------------------------------------------------------------------
    // Local offers
    // ---------------------------------------------------------------------

    async fn on_negotiation_needed(&mut self) {
        if self.state.is_negotiating() {
            debug!("Renegotiation requested while {}, deferring", self.state);
            self.pending_renegotiation = true;
            return;
        }
        self.start_offer().await;
    }

    async fn start_offer(&mut self) {
        let engine = self.session.engine().clone();
        let offer = match engine.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.sink.report(e),
        };
        if let Err(e) = engine.set_local_description(offer.clone()).await {
            return self.sink.report(e);
        }

        self.offer_backup = self.session.set_local_description(offer.clone());
        self.settled = self.state;
        self.offer_seq += 1;
        self.set_state(NegotiationState::Offering);
        self.session
            .signaling()
            .send(Outbound::StoreOffer { offer })
            .await;
        self.arm_answer_timeout();
    }

    fn arm_answer_timeout(&self) {
        let Some(timeout) = self.config.answer_timeout() else {
            return;
        };
        let queue = self.queue.clone();
        let offer_seq = self.offer_seq;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = queue.send(SessionEvent::AnswerTimeout { offer_seq });
        });
    }

    async fn on_answer_timeout(&mut self, offer_seq: u64) {
        if self.state != NegotiationState::Offering || offer_seq != self.offer_seq {
            debug!("Stale answer timer for offer #{offer_seq}");
            return;
        }

        self.sink.report(ProtocolError::AnswerTimeout {
            offer_seq,
            secs: self.config.answer_timeout_secs.unwrap_or_default(),
        });
        if let Err(e) = self.session.engine().rollback().await {
            self.sink.report(e);
        }
        let previous = self.offer_backup.take();
        self.session.restore_local_description(previous);
        self.set_state(self.settled);
        self.resume_pending().await;
    }

    // ---------------------------------------------------------------------
    // Inbound envelopes
    // ---------------------------------------------------------------------

    async fn on_inbound(&mut self, envelope: InboundEnvelope) {
        debug!("Inbound {} envelope", envelope.message.tag());
        match envelope.message {
            Inbound::Offer { offer } => self.on_remote_offer(offer, envelope.username).await,
            Inbound::Answer { answer } => self.on_remote_answer(answer).await,
            Inbound::Candidate { candidate } => self.on_remote_candidate(candidate).await,
        }
    }

    /// Whether a remote offer that collides with ours should win
    fn yields_to(&self, from: Option<&str>) -> bool {
        match self.config.glare {
            GlarePolicy::LastWriterWins => true,
            GlarePolicy::Deterministic => {
                let ours = self.session.signaling().identity().username();
                match (ours.as_deref(), from) {
                    (Some(ours), Some(theirs)) => ours <= theirs,
                    _ => true,
                }
            }
        }
    }

    async fn on_remote_offer(&mut self, offer: SessionDescription, from: Option<String>) {
        if offer.kind != SdpKind::Offer {
            self.sink
                .report(ProtocolError::WrongDescriptionKind("answer".into()));
            return;
        }

        let mut previous = self.state;
        if self.state == NegotiationState::Offering {
            if !self.yields_to(from.as_deref()) {
                self.sink.report(ProtocolError::OfferCollision {
                    from: from.unwrap_or_default(),
                });
                return;
            }
            info!("Offer collision, rolling back offer #{}", self.offer_seq);
            if let Err(e) = self.session.engine().rollback().await {
                return self.sink.report(e);
            }
            let backup = self.offer_backup.take();
            self.session.restore_local_description(backup);
            // Our media change still has to reach the peer.
            self.pending_renegotiation = true;
            previous = self.settled;
        }

        self.set_state(NegotiationState::Answering);
        match self.answer(offer).await {
            Ok(()) => self.enter_stable().await,
            Err(e) => {
                self.sink.report(e);
                self.set_state(previous);
                self.resume_pending().await;
            }
        }
    }

    async fn answer(&mut self, offer: SessionDescription) -> Result<(), EngineError> {
        let engine = self.session.engine().clone();
        engine.set_remote_description(offer.clone()).await?;
        let answer = match Self::produce_answer(engine.as_ref()).await {
            Ok(answer) => answer,
            Err(e) => {
                // The engine already took the offer; put it back where the session is.
                if let Err(rollback) = engine.rollback().await {
                    self.sink.report(rollback);
                }
                return Err(e);
            }
        };

        self.session.set_remote_description(offer);
        self.session.set_local_description(answer.clone());
        self.session
            .signaling()
            .send(Outbound::SendAnswer { answer })
            .await;
        Ok(())
    }

    async fn produce_answer(engine: &dyn PeerEngine) -> Result<SessionDescription, EngineError> {
        let answer = engine.create_answer().await?;
        engine.set_local_description(answer.clone()).await?;
        Ok(answer)
    }

    async fn on_remote_answer(&mut self, answer: SessionDescription) {
        if answer.kind != SdpKind::Answer {
            self.sink
                .report(ProtocolError::WrongDescriptionKind("offer".into()));
            return;
        }
        if self.state != NegotiationState::Offering {
            self.sink
                .report(ProtocolError::UnexpectedAnswer { state: self.state });
            return;
        }

        if let Err(e) = self
            .session
            .engine()
            .set_remote_description(answer.clone())
            .await
        {
            return self.sink.report(e);
        }
        self.session.set_remote_description(answer);
        self.offer_backup = None;
        self.enter_stable().await;
    }

    async fn on_remote_candidate(&mut self, candidate: Option<IceCandidate>) {
        let Some(candidate) = candidate else {
            debug!("Remote end of candidates");
            return;
        };
        dump_candidate("REMOTE", &candidate);
        let applied = self.session.engine().add_ice_candidate(candidate.clone()).await;
        match applied {
            Ok(()) => self.session.record_remote_candidate(candidate),
            Err(e) => self.sink.report(e),
        }
    }

    async fn on_local_candidate(&mut self, candidate: Option<IceCandidate>) {
        let Some(candidate) = candidate else {
            debug!("Local candidate gathering complete");
            analyze_candidates(self.session.local_candidates());
            return;
        };
        self.session.record_local_candidate(candidate.clone());
        self.session
            .signaling()
            .send(Outbound::StoreCandidate { candidate })
            .await;
    }

    async fn enter_stable(&mut self) {
        self.set_state(NegotiationState::Stable);
        let fingerprint = match (
            self.session.local_description(),
            self.session.remote_description(),
        ) {
            (Some(local), Some(remote)) => session_fingerprint(local, remote),
            _ => None,
        };
        if let Some(fp) = &fingerprint {
            info!("Session fingerprint {fp}");
        }
        self.sink.emit(CallEvent::Negotiated { fingerprint });
        self.resume_pending().await;
    }

    async fn resume_pending(&mut self) {
        if self.pending_renegotiation && self.state.can_offer() {
            self.pending_renegotiation = false;
            info!("Resuming deferred renegotiation");
            self.start_offer().await;
        }
    }

    // ---------------------------------------------------------------------
    // UI commands
    // ---------------------------------------------------------------------

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::ToggleMute(slot) => {
                let current = self.session.engine().sender_enabled(slot).await;
                match current {
                    Some(enabled) => self.set_enabled(slot, !enabled).await,
                    None => self.sink.report(EngineError::NoSender(slot)),
                }
            }
            Command::SetMuted { slot, muted } => self.set_enabled(slot, !muted).await,
            Command::ChangeSource { slot, device } => {
                self.change_source(slot, device.as_deref()).await
            }
            Command::HangUp => self.teardown("hung up").await,
        }
    }

    async fn set_enabled(&mut self, slot: MediaSlot, enabled: bool) {
        if let Err(e) = self
            .session
            .engine()
            .set_sender_enabled(slot, enabled)
            .await
        {
            return self.sink.report(e);
        }
        info!("{} {}", slot, if enabled { "unmuted" } else { "muted" });
        self.session.set_slot_enabled(slot, enabled);
        self.sink.emit(CallEvent::Muted {
            slot,
            muted: !enabled,
        });
    }

    async fn change_source(&mut self, slot: MediaSlot, device: Option<&str>) {
        let track = match self.session.media().acquire(slot, device).await {
            Ok(track) => track,
            Err(e) => return self.sink.report(e),
        };
        let engine = self.session.engine().clone();
        let enabled = engine
            .sender_enabled(slot)
            .await
            .unwrap_or(self.session.slot(slot).enabled);
        track.set_enabled(enabled);

        match engine.replace_track(slot, track.clone()).await {
            Ok(()) => {
                info!("{} source is now {:?}", slot, track.device);
                self.session.attach(slot, &track);
            }
            Err(e) => {
                warn!("Keeping previous {} source", slot);
                self.sink.report(e);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    pub async fn teardown(&mut self, reason: &str) {
        if self.state == NegotiationState::Closed {
            return;
        }
        info!("Tearing down session {}: {}", self.session.id(), reason);
        self.session.close().await;
        self.pending_renegotiation = false;
        self.offer_backup = None;
        self.set_state(NegotiationState::Closed);
        self.sink.emit(CallEvent::Ended {
            reason: reason.to_string(),
        });
    }
}
