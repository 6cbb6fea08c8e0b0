use async_trait::async_trait;

use crate::error::ConnectorError;

/// An open streaming session (one WebSocket connection)
#[async_trait]
pub trait StreamSession: Send {
    /// Send one text frame upstream
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError>;

    /// Wait for the next inbound text frame.
    /// Any error or close of the underlying socket is returned as `Err`.
    async fn recv_text(&mut self) -> Result<String, ConnectorError>;

    /// Close the session
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// Opens new sessions; called once per (re)connect attempt
#[async_trait]
pub trait StreamDialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn StreamSession>, ConnectorError>;
}
