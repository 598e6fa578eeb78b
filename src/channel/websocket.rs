//! Adapts an axum WebSocket into an [`EventChannel`].

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::stream::{self, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::{ChannelHandle, EventChannel, Outbound};
use crate::core::error::AppError;

/// Splits `socket`, spawns the writer task and returns the channel.
pub fn from_websocket(socket: WebSocket) -> EventChannel {
    let (mut sink, receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(frame) => {
                    if sink.send(Message::Text(Utf8Bytes::from(frame))).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        tracing::trace!(target: "channel", "WebSocket writer finished");
    });

    EventChannel::new(inbound_frames(receiver), ChannelHandle::new(tx))
}

fn inbound_frames(
    receiver: SplitStream<WebSocket>,
) -> futures::stream::BoxStream<'static, crate::core::error::Result<String>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.next().await? {
                Ok(Message::Text(text)) => return Some((Ok(text.as_str().to_owned()), receiver)),
                Ok(Message::Binary(bin)) => match String::from_utf8(bin.to_vec()) {
                    Ok(text) => return Some((Ok(text), receiver)),
                    Err(e) => {
                        tracing::warn!(target: "channel", "Ignoring non-UTF-8 binary frame: {}", e);
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => return Some((Err(AppError::Channel(e.to_string())), receiver)),
            }
        }
    })
    .boxed()
}
