//! Vybe live WebSocket client
//!
//! Authenticates with a static API key header on the upgrade request, sends
//! filter configuration frames, and yields raw inbound text frames.
//! Frame contents are built by [`crate::messages`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, trace, warn};

use crate::error::ConnectorError;
use crate::traits::{StreamDialer, StreamSession};

/// Vybe live endpoint
pub const VYBE_WS_URL: &str = "wss://api.vybenetwork.xyz/live";

/// Handshake header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Error, Debug)]
pub enum VybeWebSocketError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Vybe live WebSocket client
pub struct VybeWebSocket {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl VybeWebSocket {
    /// Connect with the API key header
    pub async fn connect(url: &str, api_key: &str) -> Result<Self, VybeWebSocketError> {
        let mut request = url.into_client_request()?;
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| VybeWebSocketError::Connection(format!("invalid api key header: {}", e)))?;
        request.headers_mut().insert(API_KEY_HEADER, key);

        info!(url = %url, "Connecting to Vybe live WebSocket");

        let (ws, response) = connect_async(request).await?;

        info!(status = ?response.status(), "Vybe WebSocket connected");

        Ok(Self { ws })
    }

    /// Send one text frame (filter configuration)
    pub async fn send_raw(&mut self, text: String) -> Result<(), VybeWebSocketError> {
        debug!(cmd = %text, "Sending frame");
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Receive the next text frame.
    /// Answers WS-level pings; binary frames are accepted when they are UTF-8.
    pub async fn recv_raw(&mut self) -> Result<String, VybeWebSocketError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received Vybe frame");
                    return Ok(text);
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        warn!(error = %e, "Dropping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WS ping, sending pong");
                    self.ws.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Vybe WebSocket closed");
                    return Err(VybeWebSocketError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(VybeWebSocketError::ConnectionClosed),
            }
        }
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> Result<(), VybeWebSocketError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

#[async_trait]
impl StreamSession for VybeWebSocket {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError> {
        self.send_raw(text)
            .await
            .map_err(|e| ConnectorError::SendFailed(e.to_string()))
    }

    async fn recv_text(&mut self) -> Result<String, ConnectorError> {
        self.recv_raw()
            .await
            .map_err(|e| ConnectorError::Disconnected(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        VybeWebSocket::close(self)
            .await
            .map_err(|e| ConnectorError::Disconnected(e.to_string()))
    }
}

/// Dials the live endpoint with a fixed URL and API key
#[derive(Clone)]
pub struct VybeDialer {
    url: String,
    api_key: String,
}

impl VybeDialer {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

impl std::fmt::Debug for VybeDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VybeDialer")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl StreamDialer for VybeDialer {
    async fn dial(&self) -> Result<Box<dyn StreamSession>, ConnectorError> {
        let ws = VybeWebSocket::connect(&self.url, &self.api_key)
            .await
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;
        Ok(Box::new(ws))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_error_display() {
        let err = VybeWebSocketError::ConnectionClosed;
        assert_eq!(format!("{}", err), "Connection closed");

        let err = VybeWebSocketError::Connection("refused".to_string());
        assert_eq!(format!("{}", err), "Connection error: refused");
    }

    #[test]
    fn test_url_constant() {
        assert!(VYBE_WS_URL.starts_with("wss://"));
        assert!(VYBE_WS_URL.ends_with("/live"));
    }

    #[test]
    fn test_dialer_debug_redacts_key() {
        let dialer = VybeDialer::new(VYBE_WS_URL, "secret-key");
        let debug = format!("{:?}", dialer);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains(VYBE_WS_URL));
    }

    #[tokio::test]
    async fn test_dial_invalid_url_fails() {
        let dialer = VybeDialer::new("not a url", "key");
        let result = dialer.dial().await;
        assert!(matches!(result, Err(ConnectorError::ConnectionFailed(_))));
    }
}
