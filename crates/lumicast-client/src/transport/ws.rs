//! WebSocket transport on tokio-tungstenite.
//!
//! Opens the socket with the broker's JSON subprotocol, splits it, and
//! bridges both halves over mpsc so the session never touches the socket
//! directly. Ping/Pong are handled at the protocol layer; Binary frames are
//! not part of this protocol and are dropped with a log line.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::client::IntoClientRequest,
    tungstenite::http::HeaderValue,
    tungstenite::Message,
};

use lumicast_core::{LumicastError, Result};

use super::{Transport, TransportConn, TransportEvent};

/// Subprotocol the broker requires for JSON group messaging.
pub const SUBPROTOCOL: &str = "json.webpubsub.azure.v1";

const OUTBOUND_QUEUE: usize = 1024;
const INBOUND_QUEUE: usize = 1024;

/// Production transport.
#[derive(Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<TransportConn> {
        let mut request = url
            .into_client_request()
            .map_err(|e| LumicastError::Transport(format!("invalid url: {e}")))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let (socket, _response) = connect_async(request)
            .await
            .map_err(|e| LumicastError::Transport(format!("connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = socket.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let (ev_tx, ev_rx) = mpsc::channel::<TransportEvent>(INBOUND_QUEUE);

        // Writer: drain the outbound queue, then close the socket cleanly.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "websocket send failed");
                    break;
                }
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        });

        // Reader: forward text frames until the socket or the session goes away.
        tokio::spawn(async move {
            while let Some(item) = ws_rx.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if ev_tx.send(TransportEvent::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Binary(b)) => {
                        tracing::debug!(len = b.len(), "dropping unexpected binary frame");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
            let _ = ev_tx.send(TransportEvent::Closed).await;
        });

        Ok(TransportConn {
            tx: out_tx,
            events: ev_rx,
        })
    }
}
