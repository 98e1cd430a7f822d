
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::producer::ProducerOptions;
use crate::rtp_parameters::{MediaKind, RtpCapabilities, RtpParameters};

/// Connection state of a WebRTC transport, as reported by the platform.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Server-side transport description handed to the platform when creating a
/// transport. ICE and DTLS blobs are opaque here; only the platform layer
/// interprets them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    pub id: String,
    pub ice_parameters: Value,
    pub ice_candidates: Value,
    pub dtls_parameters: Value,
}

/// Constraints for media acquisition, mirroring getUserMedia semantics.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Value>,
}

#[derive(Debug)]
struct TrackInner {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
}

/// Handle to one platform media track. Clones share the underlying track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(id: &str, kind: MediaKind) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: id.to_owned(),
                kind,
                enabled: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stops the track. A stopped track stays stopped; producers holding it
    /// must be closed separately.
    pub fn stop(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }
}

/// A set of tracks acquired together, e.g. one getUserMedia call.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: &str, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.to_owned(),
            tracks,
        }
    }

    pub fn get_audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == MediaKind::Audio)
            .cloned()
            .collect()
    }

    pub fn get_video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == MediaKind::Video)
            .cloned()
            .collect()
    }
}

/// An outbound RTP stream created on a send transport.
#[async_trait]
pub trait WebRtcProducer: Send + Sync {
    fn id(&self) -> String;
    fn kind(&self) -> MediaKind;
    fn paused(&self) -> bool;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn replace_track(&self, track: MediaTrack) -> Result<()>;
}

/// An inbound RTP stream created on a receive transport.
#[async_trait]
pub trait WebRtcConsumer: Send + Sync {
    fn id(&self) -> String;
    fn producer_id(&self) -> String;
    fn kind(&self) -> MediaKind;
    fn paused(&self) -> bool;
    async fn resume(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    fn track(&self) -> MediaTrack;
}

/// A WebRTC transport in either direction.
#[async_trait]
pub trait WebRtcTransport: Send + Sync {
    fn id(&self) -> String;
    fn connection_state(&self) -> TransportConnectionState;

    /// Creates a producer for the options' track. Send transports only.
    async fn produce(&self, options: ProducerOptions) -> Result<Arc<dyn WebRtcProducer>>;

    /// Creates a consumer for a remote producer. Receive transports only.
    async fn consume(
        &self,
        consumer_id: &str,
        producer_id: &str,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
    ) -> Result<Arc<dyn WebRtcConsumer>>;

    async fn close(&self) -> Result<()>;
}

/// The platform seam: everything the engine needs from the underlying WebRTC
/// and media-capture implementation. Swapped out wholesale in tests.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Prepares the device. Must complete before any capability query.
    async fn load(&self) -> Result<()>;

    /// Native RTP capabilities. `None` until loaded.
    fn rtp_capabilities(&self) -> Option<RtpCapabilities>;

    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream>;
    async fn get_display_media(&self, constraints: &MediaConstraints) -> Result<MediaStream>;

    async fn create_send_transport(
        &self,
        params: &TransportParams,
    ) -> Result<Arc<dyn WebRtcTransport>>;

    async fn create_recv_transport(
        &self,
        params: &TransportParams,
    ) -> Result<Arc<dyn WebRtcTransport>>;
}
