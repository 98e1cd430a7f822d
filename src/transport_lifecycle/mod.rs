
use std::sync::Arc;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::device::MediaStream;
use crate::error::{Error, Result};
use crate::producer::{align_producer_options, ProducerOptions, ProducerSource};
use crate::rtp_parameters::ExtendedRtpCapabilities;
use crate::session::{EventType, SessionCore, UiEvent};
use crate::socket::SocketManager;

/// Which producer refs an operation touches.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TargetOption {
    All,
    Remote,
    Local,
}

/// Fires `event` on every present socket. One socket's failure never skips
/// the other; signaling errors here are logged and absorbed because local
/// media state has already moved on.
async fn emit_to_sockets(
    sockets: &[Option<&Arc<dyn SocketManager>>],
    event: &str,
    payload: &Value,
) {
    for socket in sockets.iter().flatten() {
        if let Err(err) = socket.emit(event, payload.clone()).await {
            warn!("emit '{event}' failed: {err}");
        }
    }
}

fn take_track(stream: &MediaStream, source: ProducerSource) -> Result<crate::device::MediaTrack> {
    let track = match source {
        ProducerSource::Microphone => stream.get_audio_tracks().into_iter().next(),
        ProducerSource::Camera | ProducerSource::Screen => {
            stream.get_video_tracks().into_iter().next()
        }
    };
    track.ok_or(Error::ErrMissingTrack)
}

// Binds the options to this source: track from the capture stream, fallback
// encodings and the negotiated codec. No negotiated codec for the kind means
// the produce cannot succeed, so it is rejected up front.
fn prepare_options(
    options: &mut ProducerOptions,
    source: ProducerSource,
    stream: &MediaStream,
    extended: &ExtendedRtpCapabilities,
) -> Result<()> {
    options.source = source;
    options.track = Some(take_track(stream, source)?);
    align_producer_options(options, extended);
    if options.codec.is_none() {
        return Err(Error::ErrUnsupportedCodec);
    }
    Ok(())
}

/// Starts producing microphone audio on the send transport.
///
/// The transport handle is cloned out of the media state before the produce
/// call and the producer ref is stored only after produce succeeds, so a
/// failed produce leaves no dangling state behind.
pub async fn connect_send_transport_audio(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    let transport = {
        let media = core.media.lock().await;
        media
            .producer_transport
            .clone()
            .ok_or(Error::ErrAudioTransportNotAvailable)?
    };

    prepare_options(&mut options, ProducerSource::Microphone, &stream, extended)?;

    let producer = transport.produce(options).await?;

    {
        let mut media = core.media.lock().await;
        media.audio_producer = Some(producer);
        media.local_stream_audio = Some(stream);
        media.audio_already_on = true;
        media.mic_requesting = false;
    }

    core.ui(UiEvent::MicRequesting(false));
    core.ui(UiEvent::AudioAlreadyOn(true));

    Ok(())
}

/// Starts producing camera video on the send transport.
pub async fn connect_send_transport_video(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    let transport = {
        let media = core.media.lock().await;
        media
            .producer_transport
            .clone()
            .ok_or(Error::ErrVideoTransportNotAvailable)?
    };

    prepare_options(&mut options, ProducerSource::Camera, &stream, extended)?;

    let producer = transport.produce(options).await?;

    {
        let mut media = core.media.lock().await;
        media.video_producer = Some(producer);
        media.local_stream_video = Some(stream);
        media.video_already_on = true;
    }

    core.ui(UiEvent::VideoAlreadyOn(true));

    Ok(())
}

/// Starts producing a screen share on the send transport.
pub async fn connect_send_transport_screen(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    let transport = {
        let media = core.media.lock().await;
        media
            .producer_transport
            .clone()
            .ok_or(Error::ErrScreenTransportNotAvailable)?
    };

    prepare_options(&mut options, ProducerSource::Screen, &stream, extended)?;

    let producer = transport.produce(options).await?;

    {
        let mut media = core.media.lock().await;
        media.screen_producer = Some(producer);
        media.local_stream_screen = Some(stream);
        media.screen_already_on = true;
    }

    core.ui(UiEvent::ScreenAlreadyOn(true));

    Ok(())
}

/// Mirrors a producer onto the local (room-level) transport. The capture
/// stream is stored before anything can fail; a missing local transport is
/// an expected configuration, not an error.
pub async fn connect_local_send_transport_audio(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    prepare_options(&mut options, ProducerSource::Microphone, &stream, extended)?;

    let transport = {
        let mut media = core.media.lock().await;
        media.local_stream_audio = Some(stream);
        media.local_producer_transport.clone()
    };

    let Some(transport) = transport else {
        warn!("no local producer transport; skipping local audio producer");
        return Ok(());
    };

    let producer = transport.produce(options).await?;
    core.media.lock().await.local_audio_producer = Some(producer);

    Ok(())
}

pub async fn connect_local_send_transport_video(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    prepare_options(&mut options, ProducerSource::Camera, &stream, extended)?;

    let transport = {
        let mut media = core.media.lock().await;
        media.local_stream_video = Some(stream);
        media.local_producer_transport.clone()
    };

    let Some(transport) = transport else {
        warn!("no local producer transport; skipping local video producer");
        return Ok(());
    };

    let producer = transport.produce(options).await?;
    core.media.lock().await.local_video_producer = Some(producer);

    Ok(())
}

pub async fn connect_local_send_transport_screen(
    core: &SessionCore,
    extended: &ExtendedRtpCapabilities,
    stream: MediaStream,
    mut options: ProducerOptions,
) -> Result<()> {
    prepare_options(&mut options, ProducerSource::Screen, &stream, extended)?;

    let transport = {
        let mut media = core.media.lock().await;
        media.local_stream_screen = Some(stream);
        media.local_producer_transport.clone()
    };

    let Some(transport) = transport else {
        warn!("no local producer transport; skipping local screen producer");
        return Ok(());
    };

    let producer = transport.produce(options).await?;
    core.media.lock().await.local_screen_producer = Some(producer);

    Ok(())
}

// Host-side re-layout after dropping a producer: when nothing else holds the
// main window, rebuild the grid around the host themselves.
async fn relayout_after_disconnect(core: &SessionCore) {
    let (islevel, member) = {
        let room = core.room.lock().await;
        (room.islevel.clone(), room.member.clone())
    };
    if islevel != "2" {
        return;
    }

    let mut layout = core.layout.lock().await;
    if layout.lock_screen || layout.shared {
        return;
    }

    layout.update_main_window = true;
    layout.prepopulate_count += 1;
    core.ui(UiEvent::MainWindowRefresh(true));
    core.ui(UiEvent::Prepopulate { name: member });
    layout.update_main_window = false;
    core.ui(UiEvent::MainWindowRefresh(false));
}

/// Stops producing audio. The producer ref is taken out of the media state
/// before any await so that a failed signal or pause can never leave a
/// half-dead producer reachable.
pub async fn disconnect_send_transport_audio(
    core: &SessionCore,
    socket: Option<&Arc<dyn SocketManager>>,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let (producer, video_already_on) = {
        let mut media = core.media.lock().await;
        media.audio_already_on = false;
        (media.audio_producer.take(), media.video_already_on)
    };

    match producer {
        Some(producer) => {
            if let Err(err) = producer.pause().await {
                warn!("pausing audio producer failed: {err}");
            }
        }
        None => debug!("no audio producer to disconnect"),
    }

    let room_name = core.room.lock().await.room_name.clone();
    let payload = json!({"mediaTag": "audio", "roomName": room_name});
    emit_to_sockets(&[socket, local_socket], "pauseProducerMedia", &payload).await;

    core.ui(UiEvent::AudioAlreadyOn(false));

    if !video_already_on {
        relayout_after_disconnect(core).await;
    }

    Ok(())
}

/// Stops producing camera video. Same take-before-await discipline as audio.
pub async fn disconnect_send_transport_video(
    core: &SessionCore,
    socket: Option<&Arc<dyn SocketManager>>,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let (producer, audio_already_on) = {
        let mut media = core.media.lock().await;
        media.video_already_on = false;
        (media.video_producer.take(), media.audio_already_on)
    };

    match producer {
        Some(producer) => {
            if let Err(err) = producer.pause().await {
                warn!("pausing video producer failed: {err}");
            }
        }
        None => debug!("no video producer to disconnect"),
    }

    let room_name = core.room.lock().await.room_name.clone();
    let payload = json!({"mediaTag": "video", "roomName": room_name});
    emit_to_sockets(&[socket, local_socket], "pauseProducerMedia", &payload).await;

    core.ui(UiEvent::VideoAlreadyOn(false));

    if !audio_already_on {
        relayout_after_disconnect(core).await;
    }

    Ok(())
}

/// Stops a screen share. Screen producers are closed rather than paused:
/// a share is never resumed, a new one is created instead.
pub async fn disconnect_send_transport_screen(
    core: &SessionCore,
    socket: Option<&Arc<dyn SocketManager>>,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let producer = {
        let mut media = core.media.lock().await;
        media.screen_already_on = false;
        media.screen_producer.take()
    };

    match producer {
        Some(producer) => {
            if let Err(err) = producer.close().await {
                warn!("closing screen producer failed: {err}");
            }
        }
        None => debug!("no screen producer to disconnect"),
    }

    let room_name = core.room.lock().await.room_name.clone();
    let sockets = [socket, local_socket];
    emit_to_sockets(
        &sockets,
        "pauseProducerMedia",
        &json!({"mediaTag": "screen", "roomName": room_name}),
    )
    .await;
    emit_to_sockets(
        &sockets,
        "closeScreenProducer",
        &json!({"roomName": room_name}),
    )
    .await;

    core.ui(UiEvent::ScreenAlreadyOn(false));

    let event_type = core.room.lock().await.event_type;
    if event_type == Some(EventType::Conference) {
        core.layout.lock().await.main_height_width = 0;
        core.ui(UiEvent::MainHeightWidth(0));
    }

    Ok(())
}

/// Stops the local mirror of the audio producer. Only the local socket is
/// told; absence of one makes this a no-op.
pub async fn disconnect_local_send_transport_audio(
    core: &SessionCore,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let producer = core.media.lock().await.local_audio_producer.take();

    let Some(producer) = producer else {
        return Ok(());
    };
    if let Err(err) = producer.pause().await {
        warn!("pausing local audio producer failed: {err}");
    }

    let room_name = core.room.lock().await.room_name.clone();
    emit_to_sockets(
        &[local_socket],
        "pauseProducerMedia",
        &json!({"mediaTag": "audio", "roomName": room_name}),
    )
    .await;

    Ok(())
}

pub async fn disconnect_local_send_transport_video(
    core: &SessionCore,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let producer = core.media.lock().await.local_video_producer.take();

    let Some(producer) = producer else {
        return Ok(());
    };
    if let Err(err) = producer.pause().await {
        warn!("pausing local video producer failed: {err}");
    }

    let room_name = core.room.lock().await.room_name.clone();
    emit_to_sockets(
        &[local_socket],
        "pauseProducerMedia",
        &json!({"mediaTag": "video", "roomName": room_name}),
    )
    .await;

    Ok(())
}

pub async fn disconnect_local_send_transport_screen(
    core: &SessionCore,
    local_socket: Option<&Arc<dyn SocketManager>>,
) -> Result<()> {
    let producer = core.media.lock().await.local_screen_producer.take();

    let Some(producer) = producer else {
        return Ok(());
    };
    if let Err(err) = producer.close().await {
        warn!("closing local screen producer failed: {err}");
    }

    let room_name = core.room.lock().await.room_name.clone();
    let sockets = [local_socket];
    emit_to_sockets(
        &sockets,
        "pauseProducerMedia",
        &json!({"mediaTag": "screen", "roomName": room_name}),
    )
    .await;
    emit_to_sockets(
        &sockets,
        "closeScreenProducer",
        &json!({"roomName": room_name}),
    )
    .await;

    Ok(())
}
