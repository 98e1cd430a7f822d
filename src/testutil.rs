//! In-process fakes for the platform and signaling seams, used across the
//! lifecycle tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::device::{
    MediaConstraints, MediaDevice, MediaStream, MediaTrack, TransportConnectionState,
    TransportParams, WebRtcConsumer, WebRtcProducer, WebRtcTransport,
};
use crate::error::{Error, Result};
use crate::producer::ProducerOptions;
use crate::rtp_parameters::{MediaKind, RtpCapabilities, RtpParameters};
use crate::socket::{
    AckCallback, ConnectHandler, ConnectionState, DisconnectHandler, ErrorHandler, EventHandler,
    EventRegistry, ReconnectHandler, SocketManager,
};

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub(crate) struct FakeSocket {
    pub connected: AtomicBool,
    pub fail_emit: AtomicBool,
    /// Every fire-and-forget emit, recorded before any injected failure.
    pub emits: StdMutex<Vec<(String, Value)>>,
    /// Every emit expecting an ack.
    pub acks: StdMutex<Vec<(String, Value)>>,
    pub ack_reply: StdMutex<Value>,
    registry: EventRegistry,
    reconnect_handlers: StdMutex<Vec<ReconnectHandler>>,
    reconnect_failed_handlers: StdMutex<Vec<ConnectHandler>>,
    disconnect_handlers: StdMutex<Vec<DisconnectHandler>>,
}

impl FakeSocket {
    pub fn connected() -> Arc<Self> {
        let socket = Self::default();
        socket.connected.store(true, Ordering::SeqCst);
        Arc::new(socket)
    }

    pub fn disconnected() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emitted(&self, event: &str) -> usize {
        lock(&self.emits).iter().filter(|(e, _)| e == event).count()
    }

    pub fn acked(&self, event: &str) -> usize {
        lock(&self.acks).iter().filter(|(e, _)| e == event).count()
    }

    pub fn set_ack_reply(&self, reply: Value) {
        *lock(&self.ack_reply) = reply;
    }

    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        self.registry.dispatch(event, data)
    }

    pub fn fire_reconnect(&self, attempt: u32) {
        for handler in lock(&self.reconnect_handlers).clone() {
            handler(attempt);
        }
    }

    pub fn fire_reconnect_failed(&self) {
        for handler in lock(&self.reconnect_failed_handlers).clone() {
            handler();
        }
    }
}

#[async_trait]
impl SocketManager for FakeSocket {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn emit(&self, event: &str, data: Value) -> Result<()> {
        lock(&self.emits).push((event.to_owned(), data));
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(Error::ErrEmitFailed(event.to_owned()));
        }
        Ok(())
    }

    async fn emit_with_ack(&self, event: &str, data: Value) -> Result<Value> {
        lock(&self.acks).push((event.to_owned(), data));
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(Error::ErrEmitFailed(event.to_owned()));
        }
        Ok(lock(&self.ack_reply).clone())
    }

    fn emit_with_ack_callback(&self, event: &str, data: Value, callback: AckCallback) {
        lock(&self.acks).push((event.to_owned(), data));
        if self.fail_emit.load(Ordering::SeqCst) {
            callback(Err(Error::ErrEmitFailed(event.to_owned())));
        } else {
            callback(Ok(lock(&self.ack_reply).clone()));
        }
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.registry.on(event, handler);
    }

    fn off(&self, event: &str) {
        self.registry.off(event);
    }

    fn off_all(&self) {
        self.registry.off_all();
    }

    fn on_connect(&self, _handler: ConnectHandler) {}

    fn on_disconnect(&self, handler: DisconnectHandler) {
        lock(&self.disconnect_handlers).push(handler);
    }

    fn on_error(&self, _handler: ErrorHandler) {}

    fn on_reconnect(&self, handler: ReconnectHandler) {
        lock(&self.reconnect_handlers).push(handler);
    }

    fn on_reconnect_attempt(&self, _handler: ReconnectHandler) {}

    fn on_reconnect_failed(&self, handler: ConnectHandler) {
        lock(&self.reconnect_failed_handlers).push(handler);
    }
}

pub(crate) struct FakeProducer {
    pub id: String,
    pub kind: MediaKind,
    pub paused: AtomicBool,
    pub pause_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakeProducer {
    pub fn new(id: &str, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            kind,
            paused: AtomicBool::new(false),
            pause_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WebRtcProducer for FakeProducer {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace_track(&self, _track: MediaTrack) -> Result<()> {
        Ok(())
    }
}

pub(crate) struct FakeConsumer {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub paused: AtomicBool,
    pub resume_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakeConsumer {
    pub fn new(id: &str, producer_id: &str, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            producer_id: producer_id.to_owned(),
            kind,
            paused: AtomicBool::new(true),
            resume_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WebRtcConsumer for FakeConsumer {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn producer_id(&self) -> String {
        self.producer_id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn track(&self) -> MediaTrack {
        MediaTrack::new(&format!("{}-track", self.id), self.kind)
    }
}

#[derive(Default)]
pub(crate) struct FakeTransport {
    pub fail_produce: AtomicBool,
    pub produce_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub produced: StdMutex<Vec<Arc<FakeProducer>>>,
    /// Source recorded per produce call, for asserting option alignment.
    pub produce_options: StdMutex<Vec<ProducerOptions>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WebRtcTransport for FakeTransport {
    fn id(&self) -> String {
        "fake-transport".to_owned()
    }

    fn connection_state(&self) -> TransportConnectionState {
        TransportConnectionState::Connected
    }

    async fn produce(&self, options: ProducerOptions) -> Result<Arc<dyn WebRtcProducer>> {
        let n = self.produce_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_produce.load(Ordering::SeqCst) {
            return Err(Error::ErrOthers("produce failed".to_owned()));
        }
        let producer = FakeProducer::new(&format!("prod-{n}"), options.source.kind());
        lock(&self.produced).push(Arc::clone(&producer));
        lock(&self.produce_options).push(options);
        Ok(producer)
    }

    async fn consume(
        &self,
        consumer_id: &str,
        producer_id: &str,
        kind: MediaKind,
        _rtp_parameters: &RtpParameters,
    ) -> Result<Arc<dyn WebRtcConsumer>> {
        Ok(FakeConsumer::new(consumer_id, producer_id, kind))
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct FakeDevice {
    pub loaded: AtomicBool,
    pub capabilities: Option<RtpCapabilities>,
    pub send_transport: Arc<FakeTransport>,
    pub recv_transport: Arc<FakeTransport>,
    pub next_stream_id: AtomicUsize,
}

impl FakeDevice {
    pub fn new(capabilities: Option<RtpCapabilities>) -> Arc<Self> {
        Arc::new(Self {
            loaded: AtomicBool::new(false),
            capabilities,
            send_transport: FakeTransport::new(),
            recv_transport: FakeTransport::new(),
            next_stream_id: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MediaDevice for FakeDevice {
    async fn load(&self) -> Result<()> {
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn rtp_capabilities(&self) -> Option<RtpCapabilities> {
        if self.loaded.load(Ordering::SeqCst) {
            self.capabilities.clone()
        } else {
            None
        }
    }

    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
        let n = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let mut tracks = vec![];
        if constraints.audio.is_some() {
            tracks.push(MediaTrack::new(&format!("audio-{n}"), MediaKind::Audio));
        }
        if constraints.video.is_some() {
            tracks.push(MediaTrack::new(&format!("video-{n}"), MediaKind::Video));
        }
        Ok(MediaStream::new(&format!("stream-{n}"), tracks))
    }

    async fn get_display_media(&self, _constraints: &MediaConstraints) -> Result<MediaStream> {
        let n = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        Ok(MediaStream::new(
            &format!("display-{n}"),
            vec![MediaTrack::new(&format!("screen-{n}"), MediaKind::Video)],
        ))
    }

    async fn create_send_transport(
        &self,
        _params: &TransportParams,
    ) -> Result<Arc<dyn WebRtcTransport>> {
        Ok(Arc::clone(&self.send_transport) as Arc<dyn WebRtcTransport>)
    }

    async fn create_recv_transport(
        &self,
        _params: &TransportParams,
    ) -> Result<Arc<dyn WebRtcTransport>> {
        Ok(Arc::clone(&self.recv_transport) as Arc<dyn WebRtcTransport>)
    }
}
