//! Client channel: one bidirectional, message-oriented connection per
//! scoreboard viewer.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use board_core::Update;
use serde::Deserialize;

use crate::error::{GatewayError, Result};

/// The first message a client sends: which game it wants to watch.
#[derive(Debug, Deserialize)]
struct Hello {
    game: Option<u64>,
}

/// One connected client. The subscription owns the channel for its
/// lifetime; only it may write or close once the client is enqueued.
#[async_trait]
pub trait ClientChannel: Send {
    /// Read the hello message. [`GatewayError::BadHello`] when it is
    /// malformed or lacks `game`.
    async fn read_hello(&mut self) -> Result<u64>;

    /// Write one JSON array of update records.
    async fn write_updates(&mut self, updates: &[Update]) -> Result<()>;

    /// Close the channel. Best effort; never fails.
    async fn close(&mut self);

    /// Peer address, for logging.
    fn remote_addr(&self) -> &str;
}

/// WebSocket-backed client channel.
pub struct WsChannel {
    socket: WebSocket,
    addr: String,
}

impl WsChannel {
    pub fn new(socket: WebSocket, addr: String) -> Self {
        Self { socket, addr }
    }
}

#[async_trait]
impl ClientChannel for WsChannel {
    async fn read_hello(&mut self) -> Result<u64> {
        loop {
            let msg = match self.socket.recv().await {
                Some(Ok(msg)) => msg,
                Some(Err(_)) | None => return Err(GatewayError::ChannelClosed),
            };
            let hello: Hello = match msg {
                Message::Text(text) => {
                    serde_json::from_str(text.as_str()).map_err(|_| GatewayError::BadHello)?
                }
                Message::Binary(data) => {
                    serde_json::from_slice(&data).map_err(|_| GatewayError::BadHello)?
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return Err(GatewayError::ChannelClosed),
            };
            return hello.game.ok_or(GatewayError::BadHello);
        }
    }

    async fn write_updates(&mut self, updates: &[Update]) -> Result<()> {
        let json = serde_json::to_string(updates)?;
        self.socket
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| GatewayError::ClientWrite(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.socket.send(Message::Close(None)).await;
    }

    fn remote_addr(&self) -> &str {
        &self.addr
    }
}
