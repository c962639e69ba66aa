//! WebSocket transport to the signaling relay.

use crate::signaling::transport::{LinkState, RelayTransport, TransportError};
use crate::utils::lock;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    state: Arc<watch::Sender<LinkState>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        info!("Connecting to signaling relay {url}");
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        info!("Signaling relay connected");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();
        let (state_tx, _) = watch::channel(LinkState::Open);
        let state = Arc::new(state_tx);

        let writer_state = state.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("Relay send failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_state.send_replace(LinkState::Closed);
        });

        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Close(frame)) => {
                        info!("Relay closed the connection: {:?}", frame);
                        break;
                    }
                    Ok(msg @ (Message::Text(_) | Message::Binary(_))) => match msg.to_text() {
                        Ok(text) => {
                            if in_tx.send(text.to_owned()).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping non UTF-8 frame from relay: {e}"),
                    },
                    Ok(other) => debug!("Ignoring control frame {:?}", other),
                    Err(e) => {
                        warn!("Relay receive failed: {e}");
                        break;
                    }
                }
            }
            reader_state.send_replace(LinkState::Closed);
        });

        Ok(Self {
            outbound: out_tx,
            inbound: AsyncMutex::new(in_rx),
            state,
            reader: Mutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl RelayTransport for WsTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if *self.state.borrow() == LinkState::Closed {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(Message::text(frame))
            .map_err(|_| TransportError::SendFailed("relay writer has stopped".into()))
    }

    async fn recv(&self) -> Option<String> {
        self.inbound.lock().await.recv().await
    }

    fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    async fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
        self.state.send_replace(LinkState::Closed);
        // The writer stops by itself after flushing the close frame.
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
    }
}
