use super::messages::ClientMessage;
use crate::error::{RelayError, Result};
use axum::extract::ws::{Message, WebSocket};
use tracing::debug;

/// The client-facing duplex channel of one connection
#[async_trait::async_trait]
pub trait ClientChannel: Send {
    /// Next text message, or `None` once the client is gone.
    ///
    /// Must be cancel-safe: the relay races it against upstream events.
    async fn recv_text(&mut self) -> Option<String>;

    /// Fails with `Disconnected` when the client can no longer be reached.
    async fn send_message(&mut self, message: &ClientMessage) -> Result<()>;

    /// Best-effort close handshake.
    async fn shutdown(&mut self);
}

#[async_trait::async_trait]
impl ClientChannel for WebSocket {
    async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.recv().await {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring {} byte binary frame from client", data.len());
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            }
        }
    }

    async fn send_message(&mut self, message: &ClientMessage) -> Result<()> {
        self.send(Message::Text(message.to_text()))
            .await
            .map_err(|_| RelayError::Disconnected)
    }

    async fn shutdown(&mut self) {
        let _ = self.send(Message::Close(None)).await;
    }
}
