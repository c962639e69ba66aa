use crate::error::EngineError;
use crate::event::{EngineEvent, EventQueue, SessionEvent};
use crate::logger::dump_candidate;
use crate::peer::engine::{PeerEngine, PeerEngineFactory};
use crate::peer::ice::{from_rtc_candidate, rtc_config, to_rtc_candidate, PendingCandidates};
use crate::peer::media::LocalTrack;
use crate::peer::types::{
    IceCandidate, MediaSlot, PeerLinkState, RemoteTrack, SdpKind, ServerConfig, SessionDescription,
    SlotMap,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

struct Sender {
    rtp: Arc<RTCRtpSender>,
    track: LocalTrack,
}

/// Peer connection engine backed by webrtc-rs
pub struct RtcEngine {
    pc: Arc<RTCPeerConnection>,
    senders: Mutex<SlotMap<Option<Sender>>>,
    pending: Mutex<PendingCandidates>,
}

impl RtcEngine {
    fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, webrtc::Error> {
        match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.body),
            SdpKind::Answer => RTCSessionDescription::answer(desc.body),
        }
    }

    fn from_rtc(desc: RTCSessionDescription) -> Option<SessionDescription> {
        match desc.sdp_type {
            RTCSdpType::Offer => Some(SessionDescription::offer(desc.sdp)),
            RTCSdpType::Answer => Some(SessionDescription::answer(desc.sdp)),
            _ => None,
        }
    }

    fn rtc_track(slot: MediaSlot, track: &LocalTrack) -> Result<Arc<dyn TrackLocal + Send + Sync>, EngineError> {
        track
            .sample_track()
            .map(|t| t.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .ok_or_else(|| EngineError::Track {
                slot,
                reason: "track has no webrtc source".into(),
            })
    }

    /// Applies every candidate queued before the remote description was set
    async fn apply_pending_candidates(&self) {
        let candidates = self.pending.lock().await.take();

        for candidate in candidates {
            debug!("Applying pending candidate: {:?}", candidate);
            if let Err(e) = self.pc.add_ice_candidate(to_rtc_candidate(candidate)).await {
                warn!("Failed to apply pending candidate: {:?}", e);
            }
        }
    }

    fn wire_events(pc: &Arc<RTCPeerConnection>, events: EventQueue) {
        let queue = events.clone();
        pc.on_negotiation_needed(Box::new(move || {
            debug!("Engine raised negotiation-needed");
            let _ = queue.send(SessionEvent::Engine(EngineEvent::NegotiationNeeded));
            Box::pin(async {})
        }));

        let queue = events.clone();
        pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
            let event = match cand {
                Some(c) => match c.to_json() {
                    Ok(init) => {
                        let candidate = from_rtc_candidate(init);
                        dump_candidate("LOCAL", &candidate);
                        Some(EngineEvent::LocalCandidate(Some(candidate)))
                    }
                    Err(e) => {
                        warn!("Failed to serialize local candidate: {:?}", e);
                        None
                    }
                },
                None => {
                    debug!("ICE candidate gathering completed (null candidate received)");
                    Some(EngineEvent::LocalCandidate(None))
                }
            };
            if let Some(event) = event {
                let _ = queue.send(SessionEvent::Engine(event));
            }
            Box::pin(async {})
        }));

        let queue = events.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let kind = match track.kind() {
                    RTPCodecType::Audio => Some(MediaSlot::Audio),
                    RTPCodecType::Video => Some(MediaSlot::Video),
                    other => {
                        warn!("Ignoring remote track of kind {:?}", other);
                        None
                    }
                };
                if let Some(kind) = kind {
                    let remote = RemoteTrack {
                        track_id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                    };
                    info!("Remote {} track {} arrived", kind, remote.track_id);
                    let _ = queue.send(SessionEvent::Engine(EngineEvent::RemoteTrack(remote)));
                }
                Box::pin(async {})
            },
        ));

        let queue = events;
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            info!("Peer connection state changed to: {:?}", st);
            let state = match st {
                RTCPeerConnectionState::New => Some(PeerLinkState::New),
                RTCPeerConnectionState::Connecting => Some(PeerLinkState::Connecting),
                RTCPeerConnectionState::Connected => Some(PeerLinkState::Connected),
                RTCPeerConnectionState::Disconnected => Some(PeerLinkState::Disconnected),
                RTCPeerConnectionState::Failed => Some(PeerLinkState::Failed),
                RTCPeerConnectionState::Closed => Some(PeerLinkState::Closed),
                _ => None,
            };
            if let Some(state) = state {
                let _ = queue.send(SessionEvent::Engine(EngineEvent::ConnectionState(state)));
            }
            Box::pin(async {})
        }));
    }
}

#[async_trait]
impl PeerEngine for RtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| EngineError::CreateOffer(e.to_string()))?;
        Self::from_rtc(offer).ok_or_else(|| EngineError::CreateOffer("unexpected sdp type".into()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| EngineError::CreateAnswer(e.to_string()))?;
        Self::from_rtc(answer).ok_or_else(|| EngineError::CreateAnswer("unexpected sdp type".into()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        let desc = Self::to_rtc(desc).map_err(|e| EngineError::SetLocalDescription(e.to_string()))?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| EngineError::SetLocalDescription(e.to_string()))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        let desc =
            Self::to_rtc(desc).map_err(|e| EngineError::SetRemoteDescription(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| EngineError::SetRemoteDescription(e.to_string()))?;
        self.apply_pending_candidates().await;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), EngineError> {
        let state = self.pc.signaling_state();
        if !matches!(
            state,
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveRemoteOffer
        ) {
            return Ok(());
        }
        let rollback: RTCSessionDescription =
            serde_json::from_value(serde_json::json!({ "type": "rollback", "sdp": "" }))
                .map_err(|e| EngineError::Rollback(e.to_string()))?;
        // Rollback goes to the side that holds the pending offer.
        let result = if state == RTCSignalingState::HaveLocalOffer {
            self.pc.set_local_description(rollback).await
        } else {
            self.pc.set_remote_description(rollback).await
        };
        result.map_err(|e| EngineError::Rollback(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        if self.pc.remote_description().await.is_none() {
            self.pending.lock().await.push(candidate);
            return Ok(());
        }
        self.pc
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .map_err(|e| EngineError::AddCandidate(e.to_string()))
    }

    async fn add_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError> {
        let rtc = Self::rtc_track(slot, &track)?;
        let rtp = self.pc.add_track(rtc).await.map_err(|e| EngineError::Track {
            slot,
            reason: e.to_string(),
        })?;
        info!("Added {} track {}", slot, track.id);
        let mut senders = self.senders.lock().await;
        senders[slot] = Some(Sender { rtp, track });
        Ok(())
    }

    async fn replace_track(&self, slot: MediaSlot, track: LocalTrack) -> Result<(), EngineError> {
        let rtc = Self::rtc_track(slot, &track)?;
        let mut senders = self.senders.lock().await;
        let sender = senders[slot].as_mut().ok_or(EngineError::NoSender(slot))?;
        sender
            .rtp
            .replace_track(Some(rtc))
            .await
            .map_err(|e| EngineError::Track {
                slot,
                reason: e.to_string(),
            })?;
        info!("Replaced {} track {} -> {}", slot, sender.track.id, track.id);
        sender.track = track;
        Ok(())
    }

    async fn sender_enabled(&self, slot: MediaSlot) -> Option<bool> {
        let senders = self.senders.lock().await;
        senders[slot].as_ref().map(|s| s.track.is_enabled())
    }

    async fn set_sender_enabled(&self, slot: MediaSlot, enabled: bool) -> Result<(), EngineError> {
        let senders = self.senders.lock().await;
        let sender = senders[slot].as_ref().ok_or(EngineError::NoSender(slot))?;
        sender.track.set_enabled(enabled);
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("Error while closing peer connection: {:?}", e);
        }
    }
}

/// Builds webrtc-rs peer connections with default codecs and interceptors
#[derive(Default)]
pub struct RtcEngineFactory;

#[async_trait]
impl PeerEngineFactory for RtcEngineFactory {
    async fn create(
        &self,
        ice_servers: &[ServerConfig],
        events: EventQueue,
    ) -> Result<Arc<dyn PeerEngine>, EngineError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(
            api.new_peer_connection(rtc_config(ice_servers))
                .await
                .map_err(|e| EngineError::Setup(e.to_string()))?,
        );
        Self::log_servers(ice_servers);
        RtcEngine::wire_events(&pc, events);

        Ok(Arc::new(RtcEngine {
            pc,
            senders: Mutex::new(SlotMap::default()),
            pending: Mutex::new(PendingCandidates::default()),
        }))
    }
}

impl RtcEngineFactory {
    fn log_servers(ice_servers: &[ServerConfig]) {
        for server in ice_servers {
            debug!("ICE server {} ({}): {}", server.id, server.r#type, server.url);
        }
    }
}
