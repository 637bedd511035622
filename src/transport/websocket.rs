//! WebSocket transport
//!
//! Connects to a broker at `ws://host:port<path>` and speaks the JSON
//! protocol from `transport::message`. Responsibilities:
//! - run the optional login -> auth exchange before the session is usable
//! - translate publish/subscribe/unsubscribe calls into protocol frames
//! - turn `message` frames into `InboundFrame`s and acknowledge QoS>0 ones
//! - ping the broker after `keepalive` of silence during blocking receives

use std::fmt;
use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::message::{InboundFrame, QoS};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::{Credentials, SessionOptions, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the login/auth exchange.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsTransport {
    path: String,
    keepalive: Duration,
    stream: Option<WsStream>,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("path", &self.path)
            .field("keepalive", &self.keepalive)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            path: "/".to_string(),
            keepalive: Duration::ZERO,
            stream: None,
        }
    }

    /// Request path appended to `ws://host:port`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn handle_text(&mut self, text: &str) -> Result<Option<InboundFrame>, TransportError> {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::Message {
                topic,
                payload,
                message_id,
                qos,
                ..
            }) => {
                if qos > 0 {
                    let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
                    send(stream, &ClientMessage::Ack { message_id }).await?;
                }
                Ok(Some(InboundFrame::new(topic, payload)))
            }
            Ok(ServerMessage::Error { message }) => {
                warn!("broker reported an error: {message}");
                Ok(None)
            }
            Ok(other) => {
                debug!(?other, "ignoring broker message");
                Ok(None)
            }
            Err(e) => {
                warn!("invalid broker message: {e} | {text}");
                Ok(None)
            }
        }
    }
}

impl Transport for WsTransport {
    async fn open(&mut self, options: &SessionOptions) -> Result<(), TransportError> {
        if let Some(mut previous) = self.stream.take() {
            let _ = previous.close(None).await;
        }

        let url = format!("ws://{}:{}{}", options.host, options.port, self.path);
        let (mut stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Handshake(format!("{url}: {e}")))?;

        if let Some(credentials) = &options.credentials {
            timeout(AUTH_TIMEOUT, authenticate(&mut stream, credentials))
                .await
                .map_err(|_| TransportError::Timeout(AUTH_TIMEOUT))??;
        }

        info!(client_id = %options.client_id, "connected to {url}");
        self.keepalive = options.keepalive;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        match stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn publish(
        &mut self,
        topic: &[u8],
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let message = ClientMessage::Publish {
            topic: std::str::from_utf8(topic)?.to_string(),
            payload: std::str::from_utf8(payload)?.to_string(),
            message_id: Uuid::new_v4().to_string(),
            qos: qos.as_u8(),
            retain,
        };
        send(stream, &message).await
    }

    async fn subscribe(&mut self, topic: &[u8], qos: QoS) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let message = ClientMessage::Subscribe {
            topic: std::str::from_utf8(topic)?.to_string(),
            qos: qos.as_u8(),
        };
        send(stream, &message).await
    }

    async fn unsubscribe(&mut self, topic: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        let message = ClientMessage::Unsubscribe {
            topic: std::str::from_utf8(topic)?.to_string(),
        };
        send(stream, &message).await
    }

    async fn receive_next(
        &mut self,
        blocking: bool,
    ) -> Result<Option<InboundFrame>, TransportError> {
        let keepalive = self.keepalive;
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let next = if !blocking {
            match stream.next().now_or_never() {
                Some(next) => next,
                None => return Ok(None),
            }
        } else if keepalive.is_zero() {
            stream.next().await
        } else {
            match timeout(keepalive, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    debug!("no traffic for {keepalive:?}, pinging broker");
                    stream.send(WsMessage::Ping(Vec::new().into())).await?;
                    return Ok(None);
                }
            }
        };

        match next {
            Some(Ok(WsMessage::Text(text))) => self.handle_text(&text).await,
            Some(Ok(WsMessage::Close(frame))) => {
                debug!(?frame, "broker closed the session");
                self.stream = None;
                Err(TransportError::Closed)
            }
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => {
                self.stream = None;
                Err(e.into())
            }
            None => {
                self.stream = None;
                Err(TransportError::Closed)
            }
        }
    }
}

async fn send(stream: &mut WsStream, message: &ClientMessage) -> Result<(), TransportError> {
    let text = serde_json::to_string(message)?;
    stream.send(WsMessage::text(text)).await?;
    Ok(())
}

async fn next_server_message(stream: &mut WsStream) -> Result<ServerMessage, TransportError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            WsMessage::Text(text) => return Ok(serde_json::from_str(&text)?),
            WsMessage::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        }
    }
    Err(TransportError::Closed)
}

async fn authenticate(
    stream: &mut WsStream,
    credentials: &Credentials,
) -> Result<(), TransportError> {
    let login = ClientMessage::Login {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
    };
    send(stream, &login).await?;

    let token = match next_server_message(stream).await? {
        ServerMessage::LoginResponse { token } => token,
        ServerMessage::Error { message } => return Err(TransportError::Handshake(message)),
        other => {
            return Err(TransportError::Handshake(format!(
                "unexpected reply to login: {other:?}"
            )));
        }
    };

    send(stream, &ClientMessage::Auth { token }).await?;

    match next_server_message(stream).await? {
        ServerMessage::Authenticated {} => Ok(()),
        ServerMessage::Error { message } => Err(TransportError::Handshake(message)),
        other => Err(TransportError::Handshake(format!(
            "unexpected reply to auth: {other:?}"
        ))),
    }
}
