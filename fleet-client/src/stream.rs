//! Duplex execution stream
//!
//! One websocket connection per submission: the client sends a single
//! request, then receives job results until the server closes the stream.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

use crate::FleetClient;
use crate::error::{ClientError, Result};
use fleet_core::dto::execution::SubmissionKind;

/// A message-oriented duplex stream
#[async_trait]
pub trait MessageStream: Send {
    /// Send one text message
    async fn send(&mut self, message: String) -> Result<()>;

    /// Wait for the next text message
    ///
    /// Returns `Ok(None)` once the peer has closed the stream cleanly.
    async fn receive(&mut self) -> Result<Option<String>>;

    /// Send a close handshake and release the connection
    ///
    /// Safe to call more than once and after the peer has already closed.
    async fn close(&mut self) -> Result<()>;
}

/// Opens execution streams for a kind of submission
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, kind: SubmissionKind) -> Result<Box<dyn MessageStream>>;
}

/// Websocket implementation of [`MessageStream`]
pub struct WsTransport {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
    /// The server sent a close frame or dropped the connection
    peer_closed: bool,
}

impl WsTransport {
    /// Open a websocket connection
    ///
    /// `build_url` is called exactly once, right before connecting, so it can
    /// mint a fresh short-lived token for this connection.
    pub async fn open<F, Fut>(build_url: F) -> Result<Self>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String>> + Send,
    {
        let url = build_url().await?;
        let (socket, response) = connect_async(url.as_str()).await?;
        debug!(status = %response.status(), "execution stream opened");

        Ok(Self {
            socket,
            closed: false,
            peer_closed: false,
        })
    }
}

#[async_trait]
impl MessageStream for WsTransport {
    async fn send(&mut self, message: String) -> Result<()> {
        self.socket.send(Message::Text(message)).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<String>> {
        if self.closed || self.peer_closed {
            return Ok(None);
        }

        loop {
            match self.socket.next().await {
                None => {
                    self.peer_closed = true;
                    return Ok(None);
                }
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes).map(Some).map_err(|e| {
                        ClientError::Transport(format!("binary frame is not UTF-8: {}", e))
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "peer closed execution stream");
                    self.peer_closed = true;
                    return Ok(None);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    self.peer_closed = true;
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // After a peer close tungstenite only flushes its reply, and reports
        // any further close attempt as a send after closing.
        match self.socket.close(None).await {
            Ok(())
            | Err(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::SendAfterClosing),
            ) => {
                debug!("execution stream closed");
                Ok(())
            }
            Err(WsError::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl FleetClient {
    // =============================================================================
    // Execution Streams
    // =============================================================================

    /// Build the websocket URL for a submission kind, minting a fresh token
    pub async fn stream_url(&self, kind: SubmissionKind) -> Result<String> {
        let token = self.mint_token().await?;
        self.stream_url_with_token(kind, &token)
    }

    fn stream_url_with_token(&self, kind: SubmissionKind, token: &str) -> Result<String> {
        let raw = format!("{}/api/v1/ws/{}", self.base_url, kind.stream_path());
        let mut url = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ClientError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, self.base_url
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;
        url.query_pairs_mut().append_pair("access_token", token);

        Ok(url.to_string())
    }
}

#[async_trait]
impl StreamConnector for FleetClient {
    async fn connect(&self, kind: SubmissionKind) -> Result<Box<dyn MessageStream>> {
        info!(path = kind.stream_path(), "opening execution stream");
        let transport = WsTransport::open(|| self.stream_url(kind)).await?;
        Ok(Box::new(transport))
    }
}
