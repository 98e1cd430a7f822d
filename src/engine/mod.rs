
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::{info, warn};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::consumer;
use crate::device::{MediaDevice, MediaStream, TransportParams, WebRtcConsumer};
use crate::error::{Error, Result};
use crate::ortc;
use crate::producer::ProducerOptions;
use crate::rtp_parameters::{ExtendedRtpCapabilities, MediaKind, RtpCapabilities, RtpParameters};
use crate::session::{SessionCore, UiEvent};
use crate::socket::SocketManager;
use crate::transport_lifecycle as lifecycle;
use crate::transport_lifecycle::TargetOption;

/// Server-driven happenings the application must act on, surfaced as one
/// ordered stream next to [`UiEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    NewProducer { producer_id: String, kind: MediaKind },
}

/// Session façade: owns the signaling sockets, the platform device and the
/// shared session state, and sequences every media operation.
///
/// Operations of the same kind are serialized behind a per-kind lock so a
/// toggle storm (mute, unmute, mute) resolves in order; different kinds run
/// concurrently.
pub struct MediaSfuEngine {
    socket: Arc<dyn SocketManager>,
    local_socket: Option<Arc<dyn SocketManager>>,
    device: Arc<dyn MediaDevice>,
    core: Arc<SessionCore>,
    extended_caps: ArcSwapOption<ExtendedRtpCapabilities>,
    audio_op: Mutex<()>,
    video_op: Mutex<()>,
    screen_op: Mutex<()>,
}

impl MediaSfuEngine {
    pub fn new(
        socket: Arc<dyn SocketManager>,
        local_socket: Option<Arc<dyn SocketManager>>,
        device: Arc<dyn MediaDevice>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<UiEvent>) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            socket,
            local_socket,
            device,
            core: Arc::new(SessionCore::new(ui_tx)),
            extended_caps: ArcSwapOption::const_empty(),
            audio_op: Mutex::new(()),
            video_op: Mutex::new(()),
            screen_op: Mutex::new(()),
        });
        (engine, ui_rx)
    }

    pub fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }

    fn extended(&self) -> Result<Arc<ExtendedRtpCapabilities>> {
        self.extended_caps
            .load_full()
            .ok_or(Error::ErrDeviceNotLoaded)
    }

    /// Loads the platform device and runs the capability exchange against
    /// the server's router capabilities. Must complete before any produce
    /// or consume operation.
    pub async fn load_device(&self, remote_caps: &RtpCapabilities) -> Result<()> {
        self.device.load().await?;
        let local_caps = self
            .device
            .rtp_capabilities()
            .ok_or(Error::ErrRtpCapabilitiesMissing)?;

        let extended = ortc::get_extended_rtp_capabilities(&local_caps, remote_caps);
        self.extended_caps.store(Some(Arc::new(extended)));

        Ok(())
    }

    /// Receive capabilities to announce to the server when consuming.
    pub fn recv_rtp_capabilities(&self) -> Result<RtpCapabilities> {
        let extended = self.extended()?;
        Ok(ortc::get_recv_rtp_capabilities(&extended))
    }

    pub fn can_send(&self, kind: MediaKind) -> bool {
        self.extended()
            .map(|extended| ortc::can_send(kind, &extended))
            .unwrap_or(false)
    }

    pub fn can_receive(&self, rtp_parameters: &RtpParameters) -> bool {
        self.extended()
            .map(|extended| ortc::can_receive(rtp_parameters, &extended))
            .unwrap_or(false)
    }

    /// Joins a room and records the session identity. The ack payload is
    /// returned as-is; it carries the router capabilities and transport
    /// parameters the caller feeds back into `load_device` and the
    /// transport constructors.
    pub async fn join_room(&self, room_name: &str, member: &str, islevel: &str) -> Result<Value> {
        let reply = self
            .socket
            .emit_with_ack(
                "joinRoom",
                json!({"roomName": room_name, "member": member, "islevel": islevel}),
            )
            .await?;

        let mut room = self.core.room.lock().await;
        room.room_name = room_name.to_owned();
        room.member = member.to_owned();
        room.islevel = islevel.to_owned();

        Ok(reply)
    }

    pub async fn create_send_transport(&self, params: &TransportParams) -> Result<()> {
        let transport = self.device.create_send_transport(params).await?;
        self.core.media.lock().await.producer_transport = Some(transport);
        Ok(())
    }

    pub async fn create_local_send_transport(&self, params: &TransportParams) -> Result<()> {
        let transport = self.device.create_send_transport(params).await?;
        self.core.media.lock().await.local_producer_transport = Some(transport);
        Ok(())
    }

    pub async fn connect_audio(&self, stream: MediaStream, options: ProducerOptions) -> Result<()> {
        let extended = self.extended()?;
        let _guard = self.audio_op.lock().await;
        lifecycle::connect_send_transport_audio(&self.core, &extended, stream, options).await
    }

    pub async fn connect_video(&self, stream: MediaStream, options: ProducerOptions) -> Result<()> {
        let extended = self.extended()?;
        let _guard = self.video_op.lock().await;
        lifecycle::connect_send_transport_video(&self.core, &extended, stream, options).await
    }

    pub async fn connect_screen(&self, stream: MediaStream, options: ProducerOptions) -> Result<()> {
        let extended = self.extended()?;
        let _guard = self.screen_op.lock().await;
        lifecycle::connect_send_transport_screen(&self.core, &extended, stream, options).await
    }

    pub async fn disconnect_audio(&self, target: TargetOption) -> Result<()> {
        let _guard = self.audio_op.lock().await;
        if matches!(target, TargetOption::All | TargetOption::Remote) {
            lifecycle::disconnect_send_transport_audio(
                &self.core,
                Some(&self.socket),
                self.local_socket.as_ref(),
            )
            .await?;
        }
        if matches!(target, TargetOption::All | TargetOption::Local) {
            lifecycle::disconnect_local_send_transport_audio(
                &self.core,
                self.local_socket.as_ref(),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn disconnect_video(&self, target: TargetOption) -> Result<()> {
        let _guard = self.video_op.lock().await;
        if matches!(target, TargetOption::All | TargetOption::Remote) {
            lifecycle::disconnect_send_transport_video(
                &self.core,
                Some(&self.socket),
                self.local_socket.as_ref(),
            )
            .await?;
        }
        if matches!(target, TargetOption::All | TargetOption::Local) {
            lifecycle::disconnect_local_send_transport_video(
                &self.core,
                self.local_socket.as_ref(),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn disconnect_screen(&self, target: TargetOption) -> Result<()> {
        let _guard = self.screen_op.lock().await;
        if matches!(target, TargetOption::All | TargetOption::Remote) {
            lifecycle::disconnect_send_transport_screen(
                &self.core,
                Some(&self.socket),
                self.local_socket.as_ref(),
            )
            .await?;
        }
        if matches!(target, TargetOption::All | TargetOption::Local) {
            lifecycle::disconnect_local_send_transport_screen(
                &self.core,
                self.local_socket.as_ref(),
            )
            .await?;
        }
        Ok(())
    }

    /// Breakout rooms are an adjacent subsystem; only their signaling rides
    /// this socket. `assignments` is the server-defined room assignment list.
    pub async fn start_breakout(&self, assignments: Value) -> Result<()> {
        let room_name = self.core.room.lock().await.room_name.clone();
        self.socket
            .emit(
                "startBreakout",
                json!({"roomName": room_name, "breakoutRooms": assignments}),
            )
            .await
    }

    pub async fn stop_breakout(&self) -> Result<()> {
        let room_name = self.core.room.lock().await.room_name.clone();
        self.socket
            .emit("stopBreakout", json!({"roomName": room_name}))
            .await
    }

    pub async fn resume_consumer(
        &self,
        server_consumer_id: &str,
        consumer: Arc<dyn WebRtcConsumer>,
        stream: MediaStream,
    ) -> Result<()> {
        consumer::consumer_resume(&self.core, Some(&self.socket), server_consumer_id, consumer, stream)
            .await
    }

    /// Subscribes to server-pushed events on the remote socket. `new-producer`
    /// becomes an [`EngineSignal`] for the caller to consume against;
    /// `producer-closed` tears the matching consumer down in the background;
    /// reconnection rejoins the room or raises an alert when it cannot.
    pub fn wire_socket_events(self: &Arc<Self>) -> mpsc::UnboundedReceiver<EngineSignal> {
        let (tx, rx) = mpsc::unbounded_channel();

        let signal_tx = tx.clone();
        self.socket.on(
            "new-producer",
            Arc::new(move |data: Value| {
                let Some(producer_id) = data["producerId"].as_str() else {
                    return;
                };
                let kind = match data["kind"].as_str() {
                    Some("audio") => MediaKind::Audio,
                    Some("video") => MediaKind::Video,
                    _ => return,
                };
                let _ = signal_tx.send(EngineSignal::NewProducer {
                    producer_id: producer_id.to_owned(),
                    kind,
                });
            }),
        );

        let core = Arc::clone(&self.core);
        self.socket.on(
            "producer-closed",
            Arc::new(move |data: Value| {
                let Some(producer_id) = data["remoteProducerId"].as_str() else {
                    return;
                };
                let producer_id = producer_id.to_owned();
                let core = Arc::clone(&core);
                tokio::spawn(async move {
                    close_remote_producer(&core, &producer_id).await;
                });
            }),
        );

        let core = Arc::clone(&self.core);
        let socket = Arc::clone(&self.socket);
        self.socket.on_reconnect(Arc::new(move |attempt: u32| {
            info!("signaling restored after {attempt} attempt(s), rejoining room");
            let core = Arc::clone(&core);
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                rejoin_room(&core, socket.as_ref()).await;
            });
        }));

        let core = Arc::clone(&self.core);
        self.socket.on_reconnect_failed(Arc::new(move || {
            core.ui(UiEvent::Alert {
                message: "Connection to the session was lost and could not be restored."
                    .to_owned(),
                alert_type: "danger".to_owned(),
                duration_ms: 5000,
            });
        }));

        rx
    }

    /// Tears the whole session down: producers and consumers are closed,
    /// transports dropped, sockets disconnected. Safe to call twice.
    pub async fn disconnect(&self) -> Result<()> {
        let (producers, consumers, transports) = {
            let mut media = self.core.media.lock().await;
            let producers: Vec<_> = [
                media.audio_producer.take(),
                media.video_producer.take(),
                media.screen_producer.take(),
                media.local_audio_producer.take(),
                media.local_video_producer.take(),
                media.local_screen_producer.take(),
            ]
            .into_iter()
            .flatten()
            .collect();
            let consumers: Vec<_> = media.consumers.drain().map(|(_, c)| c).collect();
            let transports: Vec<_> = [
                media.producer_transport.take(),
                media.local_producer_transport.take(),
            ]
            .into_iter()
            .flatten()
            .collect();
            media.audio_already_on = false;
            media.video_already_on = false;
            media.screen_already_on = false;
            (producers, consumers, transports)
        };

        for producer in producers {
            if let Err(err) = producer.close().await {
                warn!("closing producer {} failed: {err}", producer.id());
            }
        }
        for consumer in consumers {
            if let Err(err) = consumer.close().await {
                warn!("closing consumer {} failed: {err}", consumer.id());
            }
        }
        for transport in transports {
            if let Err(err) = transport.close().await {
                warn!("closing transport {} failed: {err}", transport.id());
            }
        }

        if let Some(local_socket) = &self.local_socket {
            if let Err(err) = local_socket.disconnect().await {
                warn!("disconnecting local socket failed: {err}");
            }
        }
        self.socket.disconnect().await
    }
}

async fn close_remote_producer(core: &SessionCore, producer_id: &str) {
    let consumer = core.media.lock().await.consumers.remove(producer_id);
    if let Some(consumer) = consumer {
        if let Err(err) = consumer.close().await {
            warn!("closing consumer for producer {producer_id} failed: {err}");
        }
    }

    let mut roster = core.roster.lock().await;
    roster.audio_streams.retain(|s| s.producer_id != producer_id);
    roster.video_streams.retain(|s| s.producer_id != producer_id);
}

async fn rejoin_room(core: &SessionCore, socket: &dyn SocketManager) {
    let payload = {
        let room = core.room.lock().await;
        if room.room_name.is_empty() {
            return;
        }
        json!({
            "roomName": room.room_name,
            "member": room.member,
            "islevel": room.islevel,
        })
    };

    if let Err(err) = socket.emit_with_ack("joinRoom", payload).await {
        warn!("rejoin failed: {err}");
        core.ui(UiEvent::Alert {
            message: "Reconnected, but rejoining the room failed.".to_owned(),
            alert_type: "danger".to_owned(),
            duration_ms: 5000,
        });
    }
}
