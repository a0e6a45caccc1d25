//! WebSocket stream endpoint

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::Response,
};
use tracing::debug;

use crate::service::{Frame, FrameTransport, StreamReply, StreamSession};

use super::dto::StreamQuery;
use super::error::{ApiError, ApiResult};
use super::rest::AppState;

/// Upgrade to a stream session. Selector names are checked first so a bad
/// name is a plain 400 instead of an open socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Response> {
    let selection = query.selection();
    if let Err(e) = state.registry.validate(&selection) {
        let e = ApiError::from(e);
        e.log("ws", &selection);
        return Err(e);
    }

    let session = StreamSession::new(state.registry.clone(), selection, state.policy);
    debug!("Upgrading connection for session {}", session.id());

    Ok(ws.on_upgrade(move |socket| async move {
        session.run(WebSocketTransport::new(socket)).await;
    }))
}

/// `FrameTransport` over an axum WebSocket
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn recv(&mut self) -> anyhow::Result<Option<Frame>> {
        loop {
            let message = match self.socket.recv().await {
                Some(message) => message.context("websocket receive failed")?,
                None => return Ok(None),
            };

            match message {
                Message::Binary(bytes) => return Ok(Some(Frame::Binary(bytes))),
                Message::Text(text) => return Ok(Some(Frame::Text(text))),
                Message::Close(_) => return Ok(None),
                // Control frames carry no image
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn send(&mut self, reply: &StreamReply) -> anyhow::Result<()> {
        let text = serde_json::to_string(reply)?;
        self.socket
            .send(Message::Text(text))
            .await
            .context("websocket send failed")
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.socket
            .send(Message::Close(None))
            .await
            .context("websocket close failed")
    }
}
