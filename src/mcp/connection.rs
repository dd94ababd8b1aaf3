use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

const MCP_SUBPROTOCOL: &str = "mcp";

/// A bidirectional JSON-RPC channel to one tool server.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse>;

    async fn notify(&mut self, notification: &JsonRpcNotification) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// True once the remote end has gone away.
    fn is_closed(&self) -> bool;
}

/// Opens transports to tool servers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, server: &str, url: &Url) -> Result<Box<dyn Transport>>;
}

pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, server: &str, url: &Url) -> Result<Box<dyn Transport>> {
        let transport = WebSocketTransport::connect(url)
            .await
            .with_context(|| format!("Failed to open WebSocket to {}", server))?;
        Ok(Box::new(transport))
    }
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WebSocketTransport {
    pub async fn connect(url: &Url) -> Result<Self> {
        let mut request = url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(MCP_SUBPROTOCOL));

        let (stream, response) = connect_async(request).await?;
        debug!("WebSocket handshake completed ({})", response.status());

        Ok(Self {
            stream,
            closed: false,
        })
    }

    async fn write(&mut self, payload: String) -> Result<()> {
        debug!("WebSocket sending: {}", payload);
        if let Err(e) = self.stream.send(Message::Text(payload)).await {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        if self.closed {
            anyhow::bail!("Transport is closed");
        }
        self.write(serde_json::to_string(request)?).await?;

        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(e.into());
                }
                None => {
                    self.closed = true;
                    anyhow::bail!("Server closed the connection unexpectedly");
                }
            };

            match frame {
                Message::Text(text) => match serde_json::from_str::<JsonRpcResponse>(&text) {
                    Ok(response) if response.answers(request.id()) => {
                        debug!("WebSocket received: {}", text);
                        return Ok(response);
                    }
                    Ok(_) => debug!("WebSocket skipped unrelated message: {}", text),
                    Err(_) => debug!("WebSocket ignored non-JSON-RPC: {}", text),
                },
                Message::Close(frame) => {
                    self.closed = true;
                    anyhow::bail!("Server closed the connection: {:?}", frame);
                }
                _ => {}
            }
        }
    }

    async fn notify(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        if self.closed {
            anyhow::bail!("Transport is closed");
        }
        self.write(serde_json::to_string(notification)?).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.close(None).await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
