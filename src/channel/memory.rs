//! In-process transport, used by tests and embedders that drive the
//! protocol without a socket.

use futures::channel::mpsc as fmpsc;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::{ChannelHandle, Envelope, EventChannel, Outbound};
use crate::core::error::{AppError, Result};

/// The client side of an in-memory channel.
#[derive(Debug)]
pub struct MemoryPeer {
    inbound: fmpsc::UnboundedSender<Result<String>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

/// Creates a connected `(server channel, client peer)` pair.
pub fn memory_pair() -> (EventChannel, MemoryPeer) {
    let (in_tx, in_rx) = fmpsc::unbounded();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let channel = EventChannel::new(in_rx.boxed(), ChannelHandle::new(out_tx));
    let peer = MemoryPeer {
        inbound: in_tx,
        outbound: out_rx,
    };
    (channel, peer)
}

impl MemoryPeer {
    pub fn send(&self, event: &str, payload: &str) {
        let frame = serde_json::to_string(&Envelope::new(event, payload))
            .unwrap_or_default();
        self.send_raw(&frame);
    }

    pub fn send_raw(&self, frame: &str) {
        let _ = self.inbound.unbounded_send(Ok(frame.to_string()));
    }

    /// Injects a transport error into the server's read loop.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .inbound
            .unbounded_send(Err(AppError::Channel(reason.to_string())));
    }

    /// Ends the server's read loop as if the peer closed the connection.
    pub fn disconnect(&self) {
        self.inbound.close_channel();
    }

    /// Next decoded message from the server. `None` once the server closed
    /// the channel or dropped every handle.
    pub async fn recv(&mut self) -> Option<Envelope> {
        match self.outbound.recv().await? {
            Outbound::Frame(frame) => serde_json::from_str(&frame).ok(),
            Outbound::Close => None,
        }
    }

    /// Drains everything already queued without waiting.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(item) = self.outbound.try_recv() {
            if let Outbound::Frame(frame) = item {
                if let Ok(envelope) = serde_json::from_str(&frame) {
                    out.push(envelope);
                }
            }
        }
        out
    }
}
