//! Client facade
//!
//! Owns the relay connection and the username for the lifetime of the
//! client, routes inbound envelopes to the active call and hands the UI a
//! [`CallHandle`] per call.

use crate::config::CallConfig;
use crate::error::{CallError, ProtocolError};
use crate::event::{CallEvent, Command, EventQueue, SessionEvent};
use crate::identity::Identity;
use crate::logger::EventSink;
use crate::negotiation::{run_session, NegotiationController};
use crate::peer::connection::RtcEngineFactory;
use crate::peer::engine::PeerEngineFactory;
use crate::peer::media::{MediaConstraints, MediaSource};
use crate::peer::types::MediaSlot;
use crate::session::Session;
use crate::signaling::channel::SignalingChannel;
use crate::signaling::envelope::InboundEnvelope;
use crate::signaling::transport::{LinkState, RelayTransport};
use crate::signaling::ws::WsTransport;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;

type ActiveCall = Arc<RwLock<Option<EventQueue>>>;

pub struct Client {
    config: CallConfig,
    transport: Arc<dyn RelayTransport>,
    signaling: SignalingChannel,
    engines: Arc<dyn PeerEngineFactory>,
    media: Arc<dyn MediaSource>,
    sink: EventSink,
    active: ActiveCall,
    router: JoinHandle<()>,
}

impl Client {
    /// Must be called inside a Tokio runtime: spawns the inbound router.
    pub fn new(
        config: CallConfig,
        transport: Arc<dyn RelayTransport>,
        engines: Arc<dyn PeerEngineFactory>,
        media: Arc<dyn MediaSource>,
    ) -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (sink, events) = EventSink::new();
        let identity = Identity::new();
        let signaling = SignalingChannel::new(transport.clone(), identity, sink.clone());
        let active: ActiveCall = Arc::new(RwLock::new(None));
        let router = tokio::spawn(route_inbound(transport.clone(), active.clone(), sink.clone()));

        let client = Self {
            config,
            transport,
            signaling,
            engines,
            media,
            sink,
            active,
            router,
        };
        (client, events)
    }

    /// Connects to `config.relay_url` over WebSocket with the webrtc-rs engine.
    pub async fn connect(
        config: CallConfig,
        media: Arc<dyn MediaSource>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CallEvent>), CallError> {
        config.validate()?;
        let transport = WsTransport::connect(&config.relay_url).await?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(RtcEngineFactory),
            media,
        ))
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        self.signaling.identity()
    }

    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.signaling.link_state()
    }

    /// Binds the display name and sends `store_user`.
    pub async fn bind_username(&self, username: &str) -> bool {
        self.signaling.bind_username(username).await
    }

    /// Acquires local media, creates the engine and starts the session task.
    /// The engine's negotiation-needed event then drives the first offer.
    pub async fn start_call(&self, constraints: MediaConstraints) -> Result<CallHandle, CallError> {
        if !self.identity().is_bound() {
            let err: CallError = ProtocolError::IdentityUnbound("store_offer").into();
            self.sink.report(err.clone());
            return Err(err);
        }
        self.end_call().await;

        let tracks = match self.media.acquire_all(&constraints).await {
            Ok(tracks) => tracks,
            Err(e) => {
                self.sink.report(e.clone());
                return Err(e.into());
            }
        };

        let (queue, events) = mpsc::unbounded_channel();
        let engine = match self.engines.create(&self.config.ice_servers, queue.clone()).await {
            Ok(engine) => engine,
            Err(e) => {
                self.sink.report(e.clone());
                return Err(e.into());
            }
        };

        let mut session = Session::new(engine.clone(), self.signaling.clone(), self.media.clone());
        for slot in MediaSlot::ALL {
            let track = tracks[slot].clone();
            if let Err(e) = engine.add_track(slot, track.clone()).await {
                engine.close().await;
                self.sink.report(e.clone());
                return Err(e.into());
            }
            session.attach(slot, &track);
        }

        let session_id = session.id().to_string();
        info!("Starting call {session_id}");
        let controller = NegotiationController::new(
            session,
            self.config.negotiation.clone(),
            queue.clone(),
            self.sink.clone(),
        );
        tokio::spawn(run_session(controller, events));
        *self.active.write().await = Some(queue.clone());

        Ok(CallHandle { session_id, queue })
    }

    /// Hangs up the active call, if any.
    pub async fn end_call(&self) {
        if let Some(queue) = self.active.write().await.take() {
            if queue.send(SessionEvent::Command(Command::HangUp)).is_ok() {
                debug!("Ending previous call");
            }
        }
    }

    /// Ends the call and closes the relay connection.
    pub async fn shutdown(&self) {
        self.end_call().await;
        self.transport.close().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// Forwards each inbound frame, once and in order, to the active call.
async fn route_inbound(transport: Arc<dyn RelayTransport>, active: ActiveCall, sink: EventSink) {
    while let Some(frame) = transport.recv().await {
        let envelope = match InboundEnvelope::parse(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                sink.report(e);
                continue;
            }
        };

        let tag = envelope.message.tag();
        let delivered = match active.read().await.as_ref() {
            Some(queue) => queue.send(SessionEvent::Inbound(envelope)).is_ok(),
            None => false,
        };
        if !delivered {
            sink.report(ProtocolError::NoActiveCall(tag));
        }
    }

    warn!("Signaling relay connection closed");
    if let Some(queue) = active.write().await.take() {
        let _ = queue.send(SessionEvent::TransportClosed);
    }
}

/// UI-side handle to one call
#[derive(Clone, Debug)]
pub struct CallHandle {
    session_id: String,
    queue: EventQueue,
}

impl CallHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(&self, command: Command) -> Result<(), CallError> {
        self.queue
            .send(SessionEvent::Command(command))
            .map_err(|_| CallError::CallEnded)
    }

    pub fn toggle_mute(&self, slot: MediaSlot) -> Result<(), CallError> {
        self.command(Command::ToggleMute(slot))
    }

    pub fn set_muted(&self, slot: MediaSlot, muted: bool) -> Result<(), CallError> {
        self.command(Command::SetMuted { slot, muted })
    }

    /// `None` selects the default device
    pub fn change_source(&self, slot: MediaSlot, device: Option<String>) -> Result<(), CallError> {
        self.command(Command::ChangeSource { slot, device })
    }

    pub fn hang_up(&self) -> Result<(), CallError> {
        self.command(Command::HangUp)
    }

    /// False once the session task has finished
    pub fn is_live(&self) -> bool {
        !self.queue.is_closed()
    }
}
