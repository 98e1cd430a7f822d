
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::device::{MediaStream, WebRtcConsumer, WebRtcProducer, WebRtcTransport};
use crate::rtp_parameters::MediaKind;

/// What kind of room this session joined; changes layout behavior.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EventType {
    Conference,
    Webinar,
    Broadcast,
    Chat,
}

/// One remote member as tracked by the roster.
#[derive(Debug, Clone, Default)]
pub struct Participant {
    pub name: String,
    pub audio_id: Option<String>,
    pub video_id: Option<String>,
    pub muted: bool,
    /// Permission level; "2" is host.
    pub islevel: String,
}

/// A consumed remote media stream keyed by its producer.
#[derive(Clone)]
pub struct RemoteStream {
    pub producer_id: String,
    pub kind: MediaKind,
    pub stream: MediaStream,
}

/// Producers, transports and local capture streams. Single-writer: every
/// mutation happens under the container lock, and producer handles are
/// re-read after each await rather than cached across suspension points.
#[derive(Default)]
pub struct MediaState {
    pub producer_transport: Option<Arc<dyn WebRtcTransport>>,
    pub local_producer_transport: Option<Arc<dyn WebRtcTransport>>,

    pub audio_producer: Option<Arc<dyn WebRtcProducer>>,
    pub video_producer: Option<Arc<dyn WebRtcProducer>>,
    pub screen_producer: Option<Arc<dyn WebRtcProducer>>,
    pub local_audio_producer: Option<Arc<dyn WebRtcProducer>>,
    pub local_video_producer: Option<Arc<dyn WebRtcProducer>>,
    pub local_screen_producer: Option<Arc<dyn WebRtcProducer>>,

    pub local_stream_audio: Option<MediaStream>,
    pub local_stream_video: Option<MediaStream>,
    pub local_stream_screen: Option<MediaStream>,

    pub audio_already_on: bool,
    pub video_already_on: bool,
    pub screen_already_on: bool,
    /// True while microphone permission/acquisition is in flight.
    pub mic_requesting: bool,

    /// Active consumers keyed by remote producer id.
    pub consumers: HashMap<String, Arc<dyn WebRtcConsumer>>,
}

/// Grid and main-window layout flags.
#[derive(Debug, Default)]
pub struct LayoutState {
    pub update_main_window: bool,
    pub main_height_width: u32,
    pub lock_screen: bool,
    pub shared: bool,
    pub share_screen_started: bool,
    pub first_all: bool,
    pub first_round: bool,
    /// How many times the main grid has been rebuilt around a member.
    pub prepopulate_count: u32,
}

/// Who is in the room and which remote streams are flowing.
#[derive(Default)]
pub struct RosterState {
    pub participants: Vec<Participant>,
    pub audio_streams: Vec<RemoteStream>,
    pub video_streams: Vec<RemoteStream>,
    pub screen_producer_id: Option<String>,
    pub admin_video_id: Option<String>,
}

impl RosterState {
    pub fn participant_by_audio_id(&self, audio_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.audio_id.as_deref() == Some(audio_id))
    }

    pub fn participant_by_video_id(&self, video_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.video_id.as_deref() == Some(video_id))
    }
}

/// Identity of this session in its room.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub room_name: String,
    pub member: String,
    /// Own permission level; "2" is host.
    pub islevel: String,
    pub event_type: Option<EventType>,
}

/// Everything the UI needs to react to, as one ordered stream of events.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    MicRequesting(bool),
    AudioAlreadyOn(bool),
    VideoAlreadyOn(bool),
    ScreenAlreadyOn(bool),
    MainWindowRefresh(bool),
    /// The main grid should be rebuilt around this member.
    Prepopulate { name: String },
    MainHeightWidth(u32),
    Alert {
        message: String,
        alert_type: String,
        duration_ms: u64,
    },
}

/// Shared session state. Each concern lives behind its own async mutex so
/// that audio, video and screen flows contend only where they actually
/// overlap.
pub struct SessionCore {
    pub media: Mutex<MediaState>,
    pub layout: Mutex<LayoutState>,
    pub roster: Mutex<RosterState>,
    pub room: Mutex<RoomState>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

impl SessionCore {
    pub fn new(ui_tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self {
            media: Mutex::new(MediaState::default()),
            layout: Mutex::new(LayoutState::default()),
            roster: Mutex::new(RosterState::default()),
            room: Mutex::new(RoomState::default()),
            ui_tx,
        }
    }

    /// Emits a UI event. A closed receiver means the UI is gone; media
    /// teardown must still proceed, so send errors are swallowed.
    pub fn ui(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }
}
