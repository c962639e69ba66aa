//! Local media handles and the media source collaborator.

use crate::error::MediaError;
use crate::peer::types::{MediaSlot, SlotMap};
use crate::utils::random_id;
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

pub const LOCAL_STREAM_ID: &str = "callsig-local";

/// Device choice for call start. `None` picks the default device, a value
/// must match exactly.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio_device: Option<String>,
    pub video_device: Option<String>,
}

impl MediaConstraints {
    pub fn device(&self, slot: MediaSlot) -> Option<&str> {
        match slot {
            MediaSlot::Audio => self.audio_device.as_deref(),
            MediaSlot::Video => self.video_device.as_deref(),
        }
    }
}

/// A captured local source. Clones share the enabled flag.
#[derive(Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: MediaSlot,
    pub device: Option<String>,
    enabled: Arc<AtomicBool>,
    sample_track: Option<Arc<TrackLocalStaticSample>>,
}

impl LocalTrack {
    pub fn new(kind: MediaSlot, device: Option<String>, sample_track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            id: format!("{}-{}", kind, random_id()),
            kind,
            device,
            enabled: Arc::new(AtomicBool::new(true)),
            sample_track: Some(sample_track),
        }
    }

    /// Track with no webrtc-rs backing, for engines that never send media
    pub fn detached(kind: MediaSlot, device: Option<String>) -> Self {
        Self {
            id: format!("{}-{}", kind, random_id()),
            kind,
            device,
            enabled: Arc::new(AtomicBool::new(true)),
            sample_track: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Only flips the flag; nothing is renegotiated. Whoever writes samples
    /// into [`sample_track`](Self::sample_track) must check
    /// [`is_enabled`](Self::is_enabled) and skip frames while it is false.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn sample_track(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.sample_track.as_ref()
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("device", &self.device)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, slot: MediaSlot, device: Option<&str>) -> Result<LocalTrack, MediaError>;

    /// Acquire both slots; fails as a whole if either slot fails.
    async fn acquire_all(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<SlotMap<LocalTrack>, MediaError> {
        let audio = self
            .acquire(MediaSlot::Audio, constraints.device(MediaSlot::Audio))
            .await?;
        let video = self
            .acquire(MediaSlot::Video, constraints.device(MediaSlot::Video))
            .await?;
        Ok(SlotMap::new(audio, video))
    }
}

/// Media source that produces negotiable tracks without capturing anything
pub struct SyntheticSource {
    devices: SlotMap<Vec<String>>,
}

impl SyntheticSource {
    pub fn new(audio_devices: Vec<String>, video_devices: Vec<String>) -> Self {
        Self {
            devices: SlotMap::new(audio_devices, video_devices),
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(vec!["default".into()], vec!["default".into()])
    }
}

#[async_trait]
impl MediaSource for SyntheticSource {
    async fn acquire(&self, slot: MediaSlot, device: Option<&str>) -> Result<LocalTrack, MediaError> {
        let known = &self.devices[slot];
        let device = match device {
            Some(id) if known.iter().any(|d| d == id) => id.to_string(),
            Some(id) => {
                return Err(MediaError::DeviceNotFound {
                    slot,
                    device: id.to_string(),
                })
            }
            None => known.first().cloned().ok_or_else(|| MediaError::Acquire {
                slot,
                reason: "no devices available".into(),
            })?,
        };

        let capability = match slot {
            MediaSlot::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            MediaSlot::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let sample = Arc::new(TrackLocalStaticSample::new(
            capability,
            format!("{}-{}", slot, device),
            LOCAL_STREAM_ID.to_owned(),
        ));
        info!("Acquired {} source {}", slot, device);
        Ok(LocalTrack::new(slot, Some(device), sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_device_is_used_without_constraint() {
        let source = SyntheticSource::default();
        let tracks = source.acquire_all(&MediaConstraints::default()).await.unwrap();
        assert_eq!(tracks[MediaSlot::Audio].device.as_deref(), Some("default"));
        assert_eq!(tracks[MediaSlot::Video].kind, MediaSlot::Video);
        assert!(tracks[MediaSlot::Video].sample_track().is_some());
    }

    #[tokio::test]
    async fn unknown_device_fails_the_whole_acquisition() {
        let source = SyntheticSource::default();
        let constraints = MediaConstraints {
            audio_device: None,
            video_device: Some("usb-cam".into()),
        };
        let err = source.acquire_all(&constraints).await.unwrap_err();
        assert_eq!(
            err,
            MediaError::DeviceNotFound {
                slot: MediaSlot::Video,
                device: "usb-cam".into()
            }
        );
    }

    #[test]
    fn clones_share_enabled_flag() {
        let track = LocalTrack::detached(MediaSlot::Audio, None);
        let clone = track.clone();
        clone.set_enabled(false);
        assert!(!track.is_enabled());
    }
}
