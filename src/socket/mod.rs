pub mod websocket;

#[cfg(test)]
mod socket_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use websocket::WebSocketManager;

/// Lifecycle state of a signaling connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    /// Reconnection attempts exhausted. Terminal.
    Failed,
}

/// Tunables for a signaling connection.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub reconnection: bool,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub ack_timeout: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            reconnection: true,
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(10),
        }
    }
}

pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;
pub type DisconnectHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type ReconnectHandler = Arc<dyn Fn(u32) + Send + Sync>;
pub type AckCallback = Box<dyn FnOnce(Result<Value>) + Send>;

/// Named-event handler table shared between the connection task and callers.
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventRegistry {
    pub fn on(&self, event: &str, handler: EventHandler) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event.to_owned()).or_default().push(handler);
    }

    pub fn off(&self, event: &str) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.remove(event);
    }

    pub fn off_all(&self) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.clear();
    }

    /// Invokes every handler registered for `event`, outside the lock.
    /// Returns how many handlers ran.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<EventHandler> = {
            let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
            handlers.get(event).cloned().unwrap_or_default()
        };
        for handler in &snapshot {
            handler(data.clone());
        }
        snapshot.len()
    }
}

/// Signaling connection contract.
///
/// Implementations own the transport and its reconnection policy; callers
/// only see events, emits and connection state. All methods must be safe to
/// call from any task at any time, including before `connect` and after a
/// terminal failure.
#[async_trait]
pub trait SocketManager: Send + Sync {
    /// Opens the connection. Resolves once the transport is established and
    /// fails without retrying; reconnection only applies to established
    /// connections that drop.
    async fn connect(&self) -> Result<()>;

    /// Closes the connection intentionally. No reconnection follows.
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;
    fn connection_state(&self) -> ConnectionState;

    /// Fire-and-forget emit. Fails when the transport is not writable; the
    /// server's handling of the event is not observed.
    async fn emit(&self, event: &str, data: Value) -> Result<()>;

    /// Emit expecting an acknowledgement payload from the server. Fails with
    /// `ErrSocketTimeout` when no ack arrives within the configured window
    /// and `ErrSocketClosed` when the connection drops while waiting.
    async fn emit_with_ack(&self, event: &str, data: Value) -> Result<Value>;

    /// Like `emit_with_ack` but delivers the outcome to a callback from a
    /// background task instead of suspending the caller.
    fn emit_with_ack_callback(&self, event: &str, data: Value, callback: AckCallback);

    fn on(&self, event: &str, handler: EventHandler);
    fn off(&self, event: &str);
    fn off_all(&self);

    fn on_connect(&self, handler: ConnectHandler);
    fn on_disconnect(&self, handler: DisconnectHandler);
    fn on_error(&self, handler: ErrorHandler);
    fn on_reconnect(&self, handler: ReconnectHandler);
    fn on_reconnect_attempt(&self, handler: ReconnectHandler);
    fn on_reconnect_failed(&self, handler: ConnectHandler);
}
