//! Duplex named-event bus over a long-lived connection.
//!
//! Every message is an [`Envelope`] `{eventName, payload}`. Inbound messages
//! are dispatched to handlers registered with [`EventChannel::on`] or
//! [`EventChannel::once`]; outbound messages go through a cloneable
//! [`ChannelHandle`] so long-running work can keep reporting after the
//! handler that started it has returned.
//!
//! Dispatch is sequential: [`EventChannel::listen`] awaits each handler
//! before reading the next message.

pub mod memory;
pub mod websocket;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::mpsc;

use crate::core::error::{AppError, Result};
use crate::core::models::Response;

/// Reason reported by [`EventChannel::listen`] once the peer hangs up.
pub const PEER_CLOSED_MSG: &str = "connection closed by peer";

/// Wire format of a single message in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(default)]
    pub payload: String,
}

impl Envelope {
    pub fn new(event_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            payload: payload.into(),
        }
    }
}

/// Frames queued for the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Close,
}

/// Cloneable sending half of a channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelHandle {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }

    /// Sends `payload` verbatim under `event`.
    pub fn send(&self, event: &str, payload: impl Into<String>) {
        let envelope = Envelope::new(event, payload);
        match serde_json::to_string(&envelope) {
            Ok(frame) => {
                if self.tx.send(Outbound::Frame(frame)).is_err() {
                    tracing::trace!(target: "channel", "Dropping '{}': connection closed", event);
                }
            }
            Err(e) => tracing::error!(target: "channel", "Failed to encode '{}': {}", event, e),
        }
    }

    /// Sends `value` JSON-encoded as the payload.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => self.send(event, payload),
            Err(e) => tracing::error!(target: "channel", "Failed to encode payload for '{}': {}", event, e),
        }
    }

    pub fn emit_err(&self, event: &str, msg: impl Into<String>) {
        self.emit(event, &Response::error(msg));
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

}

type Handler = Box<dyn FnMut(String) -> BoxFuture<'static, ()> + Send>;

/// Receiving half plus the handler table for one connection.
pub struct EventChannel {
    inbound: BoxStream<'static, Result<String>>,
    handle: ChannelHandle,
    handlers: HashMap<String, Handler>,
    once: HashSet<String>,
}

impl EventChannel {
    pub fn new(inbound: BoxStream<'static, Result<String>>, handle: ChannelHandle) -> Self {
        Self {
            inbound,
            handle,
            handlers: HashMap::new(),
            once: HashSet::new(),
        }
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    pub fn send(&self, event: &str, payload: impl Into<String>) {
        self.handle.send(event, payload);
    }

    /// Registers a persistent handler, replacing any previous one for `event`.
    pub fn on<F, Fut>(&mut self, event: &str, mut handler: F)
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.once.remove(event);
        self.handlers
            .insert(event.to_string(), Box::new(move |payload| handler(payload).boxed()));
    }

    /// Registers a handler that is removed after its first invocation.
    pub fn once<F, Fut>(&mut self, event: &str, handler: F)
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(event, handler);
        self.once.insert(event.to_string());
    }

    pub fn close(&self) {
        self.handle.close();
    }

    /// Reads and dispatches messages until the connection ends. Always
    /// returns an error: [`AppError::Channel`] when the peer closes, or the
    /// transport failure itself.
    pub async fn listen(&mut self) -> Result<()> {
        while let Some(frame) = self.inbound.next().await {
            let frame = frame?;
            let envelope: Envelope = match serde_json::from_str(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(target: "channel", "Ignoring malformed message: {}", e);
                    continue;
                }
            };

            let fut = if self.once.remove(&envelope.event_name) {
                self.handlers
                    .remove(&envelope.event_name)
                    .map(|mut handler| handler(envelope.payload))
            } else {
                self.handlers
                    .get_mut(&envelope.event_name)
                    .map(|handler| handler(envelope.payload))
            };

            match fut {
                Some(fut) => fut.await,
                None => {
                    tracing::trace!(target: "channel", "No handler for '{}'", envelope.event_name)
                }
            }
        }
        Err(AppError::Channel(PEER_CLOSED_MSG.to_string()))
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<_> = self.handlers.keys().collect();
        events.sort();
        f.debug_struct("EventChannel")
            .field("events", &events)
            .field("once", &self.once.len())
            .finish()
    }
}
