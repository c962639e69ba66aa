use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Which half of an offer/answer exchange a description belongs to
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Opaque negotiation blob, serialized the way browsers serialize
/// `RTCSessionDescription`: `{ "type": "offer", "sdp": "..." }`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    #[serde(rename = "sdp")]
    pub body: String,
}

impl SessionDescription {
    pub fn offer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            body: body.into(),
        }
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            body: body.into(),
        }
    }
}

/// ICE candidate in browser JSON form (`RTCIceCandidateInit`)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// ICE server entry as it appears in the config file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

/// The two sender slots of the local stream
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaSlot {
    Audio,
    Video,
}

impl MediaSlot {
    pub const ALL: [MediaSlot; 2] = [MediaSlot::Audio, MediaSlot::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaSlot::Audio => "audio",
            MediaSlot::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(MediaSlot::Audio),
            "video" => Some(MediaSlot::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value per media slot, addressed by `MediaSlot` rather than position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap<T> {
    audio: T,
    video: T,
}

impl<T> SlotMap<T> {
    pub fn new(audio: T, video: T) -> Self {
        Self { audio, video }
    }
}

impl<T> Index<MediaSlot> for SlotMap<T> {
    type Output = T;

    fn index(&self, slot: MediaSlot) -> &T {
        match slot {
            MediaSlot::Audio => &self.audio,
            MediaSlot::Video => &self.video,
        }
    }
}

impl<T> IndexMut<MediaSlot> for SlotMap<T> {
    fn index_mut(&mut self, slot: MediaSlot) -> &mut T {
        match slot {
            MediaSlot::Audio => &mut self.audio,
            MediaSlot::Video => &mut self.video,
        }
    }
}

/// Handle of a negotiated remote track, handed to the UI for rendering
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub track_id: String,
    pub stream_id: String,
    pub kind: MediaSlot,
}

/// Transport-level state of the peer connection as reported by the engine
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerLinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}
