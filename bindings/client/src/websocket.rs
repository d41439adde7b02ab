use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{RemoteError, RemoteResult};
use crate::transport::Transport;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON RPC over a websocket, one request in flight at a time.
pub struct WebsocketTransport {
    socket: Mutex<Option<Socket>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl std::fmt::Debug for WebsocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsocketTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WebsocketTransport {
    pub async fn connect(url: &url::Url) -> RemoteResult<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(map_ws_err)?;
        log::debug!("Connected to {url}");

        Ok(Self {
            socket: Mutex::new(Some(socket)),
            next_id: AtomicU64::new(1),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WebsocketTransport {
    async fn request(&self, command: &str, params: Value) -> RemoteResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut request = match params {
            Value::Object(fields) => Value::Object(fields),
            Value::Null => Value::Object(Default::default()),
            other => {
                return Err(RemoteError::Decode(format!(
                    "request parameters must be an object, got {other}"
                )))
            }
        };
        request["id"] = id.into();
        request["command"] = command.into();

        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(RemoteError::Closed)?;

        socket
            .send(Message::Text(request.to_string()))
            .await
            .map_err(map_ws_err)?;

        match tokio::time::timeout(self.timeout, read_response(socket, id)).await {
            Ok(response) => response,
            Err(_) => {
                log::warn!("Request {command} with id {id} timed out after {:?}", self.timeout);
                Err(RemoteError::Timeout)
            }
        }
    }

    async fn close(&self) -> RemoteResult<()> {
        if let Some(mut socket) = self.socket.lock().await.take() {
            socket.close(None).await.map_err(map_ws_err)?;
        }
        Ok(())
    }
}

/// Read messages until the response to request `id` arrives. Subscription streams and responses
/// to abandoned requests are skipped.
async fn read_response(socket: &mut Socket, id: u64) -> RemoteResult<Value> {
    while let Some(message) = socket.next().await {
        let text = match message.map_err(map_ws_err)? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| RemoteError::Decode(format!("binary message is not UTF-8: {e}")))?,
            Message::Close(_) => return Err(RemoteError::Closed),
            _ => continue,
        };

        let envelope: Value =
            serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))?;
        if envelope.get("id").and_then(Value::as_u64) == Some(id) {
            return Ok(envelope);
        }
        log::trace!("Skipping unrelated message: {text}");
    }

    Err(RemoteError::Closed)
}

fn map_ws_err(err: tungstenite::Error) -> RemoteError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            RemoteError::Closed
        }
        other => RemoteError::Transport(other.to_string()),
    }
}
