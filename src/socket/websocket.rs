use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{
    AckCallback, ConnectHandler, ConnectionState, DisconnectHandler, ErrorHandler, EventHandler,
    EventRegistry, ReconnectHandler, SocketConfig, SocketManager,
};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One signaling message on the wire. An `event` frame is dispatched to
/// registered handlers; a frame carrying only `ack` resolves a pending
/// acknowledgement.
#[derive(Debug, Default, Deserialize, Serialize)]
struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack: Option<u64>,
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct Shared {
    url: String,
    config: SocketConfig,
    state: StdMutex<ConnectionState>,
    registry: EventRegistry,
    // Sender into the current connection's write task; None when not writable.
    writer: StdMutex<Option<mpsc::UnboundedSender<Message>>>,
    pending_acks: StdMutex<HashMap<u64, oneshot::Sender<Value>>>,
    // Set by disconnect(); suppresses reconnection.
    closed: AtomicBool,
    connect_handlers: StdMutex<Vec<ConnectHandler>>,
    disconnect_handlers: StdMutex<Vec<DisconnectHandler>>,
    error_handlers: StdMutex<Vec<ErrorHandler>>,
    reconnect_handlers: StdMutex<Vec<ReconnectHandler>>,
    reconnect_attempt_handlers: StdMutex<Vec<ReconnectHandler>>,
    reconnect_failed_handlers: StdMutex<Vec<ConnectHandler>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn fire_connect(&self) {
        for handler in lock(&self.connect_handlers).clone() {
            handler();
        }
    }

    fn fire_disconnect(&self, reason: &str) {
        for handler in lock(&self.disconnect_handlers).clone() {
            handler(reason);
        }
    }

    fn fire_error(&self, message: &str) {
        for handler in lock(&self.error_handlers).clone() {
            handler(message);
        }
    }

    fn fire_reconnect(&self, attempt: u32) {
        for handler in lock(&self.reconnect_handlers).clone() {
            handler(attempt);
        }
    }

    fn fire_reconnect_attempt(&self, attempt: u32) {
        for handler in lock(&self.reconnect_attempt_handlers).clone() {
            handler(attempt);
        }
    }

    fn fire_reconnect_failed(&self) {
        for handler in lock(&self.reconnect_failed_handlers).clone() {
            handler();
        }
    }

    // Dropping the senders wakes every waiter with ErrSocketClosed.
    fn fail_pending_acks(&self) {
        lock(&self.pending_acks).clear();
    }

    fn handle_message(&self, msg: Message) {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => return,
            _ => return,
        };

        let frame: Frame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!("discarding malformed frame: {err}");
                return;
            }
        };

        match (frame.event, frame.ack) {
            (Some(event), _) => {
                let handled = self.registry.dispatch(&event, &frame.data);
                if handled == 0 {
                    debug!("no handler registered for event '{event}'");
                }
            }
            (None, Some(ack)) => {
                let sender = lock(&self.pending_acks).remove(&ack);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(frame.data);
                    }
                    None => debug!("ack {ack} arrived after its waiter gave up"),
                }
            }
            (None, None) => debug!("frame without event or ack"),
        }
    }
}

/// WebSocket-backed [`SocketManager`]. One task per live connection drives
/// reads and writes; a supervising task owns the reconnect policy.
#[derive(Clone)]
pub struct WebSocketManager {
    shared: Arc<Shared>,
}

impl WebSocketManager {
    pub fn new(url: &str, config: SocketConfig) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|_| Error::ErrInvalidSocketUrl)?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(Error::ErrInvalidSocketUrl);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                url: url.to_owned(),
                config,
                state: StdMutex::new(ConnectionState::New),
                registry: EventRegistry::default(),
                writer: StdMutex::new(None),
                pending_acks: StdMutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                connect_handlers: StdMutex::new(vec![]),
                disconnect_handlers: StdMutex::new(vec![]),
                error_handlers: StdMutex::new(vec![]),
                reconnect_handlers: StdMutex::new(vec![]),
                reconnect_attempt_handlers: StdMutex::new(vec![]),
                reconnect_failed_handlers: StdMutex::new(vec![]),
            }),
        })
    }

    fn send_frame(&self, frame: &Frame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        let writer = lock(&self.shared.writer).clone();
        match writer {
            Some(writer) => writer
                .send(Message::text(text))
                .map_err(|_| Error::ErrSocketClosed),
            None => Err(Error::ErrSocketNotConnected),
        }
    }
}

#[async_trait]
impl SocketManager for WebSocketManager {
    async fn connect(&self) -> Result<()> {
        {
            let mut state = lock(&self.shared.state);
            if matches!(
                *state,
                ConnectionState::Connecting
                    | ConnectionState::Connected
                    | ConnectionState::Reconnecting
            ) {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }
        self.shared.closed.store(false, Ordering::SeqCst);

        let (stream, _response) = match connect_async(self.shared.url.as_str()).await {
            Ok(ok) => ok,
            Err(err) => {
                self.shared.set_state(ConnectionState::Failed);
                return Err(err.into());
            }
        };

        // The writer must be installed before connect() returns; an emit
        // issued right after a successful connect goes through it.
        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        *lock(&self.shared.writer) = Some(tx);

        self.shared.set_state(ConnectionState::Connected);
        self.shared.fire_connect();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(session_loop(shared, stream, rx));

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        // Dropping the writer ends the connection task's write loop.
        lock(&self.shared.writer).take();
        self.shared.fail_pending_acks();
        self.shared.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.state() == ConnectionState::Connected
    }

    fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    async fn emit(&self, event: &str, data: Value) -> Result<()> {
        self.send_frame(&Frame {
            event: Some(event.to_owned()),
            data,
            ack: None,
        })
    }

    async fn emit_with_ack(&self, event: &str, data: Value) -> Result<Value> {
        let ack_id = rand::random::<u64>();
        let (tx, rx) = oneshot::channel();
        lock(&self.shared.pending_acks).insert(ack_id, tx);

        let sent = self.send_frame(&Frame {
            event: Some(event.to_owned()),
            data,
            ack: Some(ack_id),
        });
        if let Err(err) = sent {
            lock(&self.shared.pending_acks).remove(&ack_id);
            return Err(err);
        }

        match tokio::time::timeout(self.shared.config.ack_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::ErrSocketClosed),
            Err(_) => {
                lock(&self.shared.pending_acks).remove(&ack_id);
                Err(Error::ErrSocketTimeout)
            }
        }
    }

    fn emit_with_ack_callback(&self, event: &str, data: Value, callback: AckCallback) {
        let this = self.clone();
        let event = event.to_owned();
        tokio::spawn(async move {
            callback(this.emit_with_ack(&event, data).await);
        });
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.shared.registry.on(event, handler);
    }

    fn off(&self, event: &str) {
        self.shared.registry.off(event);
    }

    fn off_all(&self) {
        self.shared.registry.off_all();
    }

    fn on_connect(&self, handler: ConnectHandler) {
        lock(&self.shared.connect_handlers).push(handler);
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        lock(&self.shared.disconnect_handlers).push(handler);
    }

    fn on_error(&self, handler: ErrorHandler) {
        lock(&self.shared.error_handlers).push(handler);
    }

    fn on_reconnect(&self, handler: ReconnectHandler) {
        lock(&self.shared.reconnect_handlers).push(handler);
    }

    fn on_reconnect_attempt(&self, handler: ReconnectHandler) {
        lock(&self.shared.reconnect_attempt_handlers).push(handler);
    }

    fn on_reconnect_failed(&self, handler: ConnectHandler) {
        lock(&self.shared.reconnect_failed_handlers).push(handler);
    }
}

/// Supervises one connection after another until an intentional disconnect,
/// a terminal reconnect failure, or (with reconnection off) the first drop.
async fn session_loop(
    shared: Arc<Shared>,
    mut stream: WsStream,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        run_connection(&shared, stream, rx).await;
        shared.fail_pending_acks();
        lock(&shared.writer).take();

        if shared.closed.load(Ordering::SeqCst) {
            shared.set_state(ConnectionState::Disconnected);
            shared.fire_disconnect("io client disconnect");
            return;
        }

        shared.fire_disconnect("transport close");

        if !shared.config.reconnection {
            shared.set_state(ConnectionState::Disconnected);
            return;
        }

        match reconnect(&shared).await {
            Some((new_stream, new_rx)) => {
                stream = new_stream;
                rx = new_rx;
            }
            None => {
                if shared.closed.load(Ordering::SeqCst) {
                    shared.set_state(ConnectionState::Disconnected);
                } else {
                    shared.set_state(ConnectionState::Failed);
                    shared.fire_reconnect_failed();
                }
                return;
            }
        }
    }
}

/// Drives one live connection: pumps queued outgoing frames into the sink
/// and dispatches incoming frames, until either side ends.
async fn run_connection(
    shared: &Arc<Shared>,
    stream: WsStream,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                // None means disconnect() dropped the sender.
                let Some(msg) = outgoing else { break };
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(msg)) => shared.handle_message(msg),
                    Some(Err(err)) => {
                        shared.fire_error(&err.to_string());
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn reconnect(shared: &Arc<Shared>) -> Option<(WsStream, mpsc::UnboundedReceiver<Message>)> {
    shared.set_state(ConnectionState::Reconnecting);

    for attempt in 1..=shared.config.reconnection_attempts {
        shared.fire_reconnect_attempt(attempt);
        tokio::time::sleep(shared.config.reconnection_delay).await;

        if shared.closed.load(Ordering::SeqCst) {
            return None;
        }

        match connect_async(shared.url.as_str()).await {
            Ok((stream, _response)) => {
                let (tx, rx) = mpsc::unbounded_channel::<Message>();
                *lock(&shared.writer) = Some(tx);
                shared.set_state(ConnectionState::Connected);
                shared.fire_reconnect(attempt);
                return Some((stream, rx));
            }
            Err(err) => warn!("reconnect attempt {attempt} failed: {err}"),
        }
    }

    None
}
