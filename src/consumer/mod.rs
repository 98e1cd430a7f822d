
use std::sync::Arc;

use log::debug;
use serde_json::json;

use crate::device::{MediaStream, WebRtcConsumer};
use crate::error::{Error, Result};
use crate::rtp_parameters::MediaKind;
use crate::session::{RemoteStream, SessionCore, UiEvent};
use crate::socket::SocketManager;

/// Resumes a server-side paused consumer and wires its stream into the
/// session.
///
/// The signaling socket is checked before anything else: without a connected
/// socket the server cannot be told to resume, so nothing is touched. After
/// the ack the local consumer is resumed and registered; a producer id the
/// roster does not know yet is benign, the stream is simply not surfaced.
pub async fn consumer_resume(
    core: &SessionCore,
    socket: Option<&Arc<dyn SocketManager>>,
    server_consumer_id: &str,
    consumer: Arc<dyn WebRtcConsumer>,
    stream: MediaStream,
) -> Result<()> {
    let socket = socket
        .filter(|s| s.is_connected())
        .ok_or(Error::ErrSocketNotConnected)?;

    socket
        .emit_with_ack(
            "consumer-resume",
            json!({"serverConsumerId": server_consumer_id}),
        )
        .await?;

    consumer.resume().await?;

    let producer_id = consumer.producer_id();
    let kind = consumer.kind();

    core.media
        .lock()
        .await
        .consumers
        .insert(producer_id.clone(), Arc::clone(&consumer));

    let mut roster = core.roster.lock().await;

    let participant_known = match kind {
        MediaKind::Audio => roster.participant_by_audio_id(&producer_id).is_some(),
        MediaKind::Video => roster.participant_by_video_id(&producer_id).is_some(),
    };
    if !participant_known {
        debug!("no roster entry for producer {producer_id} yet; stream not surfaced");
        return Ok(());
    }

    let remote = RemoteStream {
        producer_id: producer_id.clone(),
        kind,
        stream,
    };
    match kind {
        MediaKind::Audio => roster.audio_streams.push(remote),
        MediaKind::Video => roster.video_streams.push(remote),
    }

    // A screen share or the admin's camera owns the main window.
    let is_main_video = kind == MediaKind::Video
        && (roster.screen_producer_id.as_deref() == Some(producer_id.as_str())
            || roster.admin_video_id.as_deref() == Some(producer_id.as_str()));
    drop(roster);

    if is_main_video {
        let mut layout = core.layout.lock().await;
        layout.update_main_window = true;
        layout.first_round = false;
        core.ui(UiEvent::MainWindowRefresh(true));
    }

    Ok(())
}
