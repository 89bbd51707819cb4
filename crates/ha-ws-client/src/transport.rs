//! Duplex transport seam
//!
//! The engine speaks to the hub through [`Transport`]; [`WsConnector`]
//! provides the real websocket implementation on top of tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{SyncError, SyncResult};
use crate::wire::WirePayload;

/// An open connection to the hub
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame
    async fn send(&mut self, frame: String) -> SyncResult<()>;

    /// Next data frame, `None` once the peer has closed
    async fn recv(&mut self) -> Option<SyncResult<WirePayload>>;

    /// Close the connection; further calls are no-ops
    async fn close(&mut self);
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> SyncResult<Box<dyn Transport>>;
}

/// Default time allowed for the websocket handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects with tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> SyncResult<Box<dyn Transport>> {
        debug!("Connecting to {}", url);
        let (stream, _response) = timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| SyncError::transport("connect timeout"))?
            .map_err(SyncError::transport)?;

        Ok(Box::new(WsTransport {
            stream,
            closed: false,
        }))
    }
}

/// A tokio-tungstenite websocket
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> SyncResult<()> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(SyncError::transport)
    }

    async fn recv(&mut self) -> Option<SyncResult<WirePayload>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(SyncError::transport(e))),
            };

            match message {
                Message::Text(text) => return Some(Ok(WirePayload::Text(text))),
                Message::Binary(bytes) => return Some(Ok(WirePayload::Binary(bytes))),
                Message::Close(frame) => {
                    debug!("Hub closed the connection: {:?}", frame);
                    return None;
                }
                // Pings are answered by tungstenite itself
                other => trace!("Ignoring control frame {:?}", other),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing websocket: {}", e);
        }
    }
}
