//!
//! Transport adapter: the abstract duplex message socket the channel uses
//! for I/O, independent of whatever library actually speaks WebSocket.
//! [`RawDuplex`] is the Rust realization of the outbound-connection adapter
//! contract (`connect`/`send`/`recv`/`close`); inbound (server-side)
//! connections implement the same trait after their handshake has already
//! been accepted by the hosting HTTP framework (see `chanrpc-axum`).
//!

use crate::error::{Result, TransportError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A single duplex frame: a whole text or binary message, never partial.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Frame::Text(s) => s.into_bytes(),
            Frame::Binary(b) => b,
        }
    }
}

/// Abstract duplex message socket: `send`/`recv`/`close` over whatever
/// underlying connection is already established. `recv` returns `Ok(None)`
/// when the peer closed normally — never an error for that case.
#[async_trait]
pub trait RawDuplex: Send + Sync {
    async fn send(&self, frame: Frame) -> Result<()>;
    async fn recv(&self) -> Result<Option<Frame>>;
    async fn close(&self, code: u16) -> Result<()>;
}

/// Connects a fresh [`RawDuplex`] to `uri`. A client wrapper is constructed
/// with a factory implementing this trait rather than a concrete transport
/// so tests can substitute an in-memory loopback.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, uri: &str, opts: &ConnectOptions) -> Result<Box<dyn RawDuplex>>;
}

/// Opaque extra options forwarded from the client wrapper's construction
/// kwargs down to `transport.connect` (extra headers, proxy URL, ...).
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub headers: Vec<(String, String)>,
}

/// `tokio-tungstenite`-backed outbound WebSocket transport.
pub struct WsClientDuplex {
    sink: Mutex<futures_util::stream::SplitSink<WsStream, WsMessage>>,
    stream: Mutex<futures_util::stream::SplitStream<WsStream>>,
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub struct WsClientTransportFactory;

#[async_trait]
impl TransportFactory for WsClientTransportFactory {
    async fn connect(&self, uri: &str, opts: &ConnectOptions) -> Result<Box<dyn RawDuplex>> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = uri
            .into_client_request()
            .map_err(|e| crate::error::Error::Transport(TransportError::Transient(e.to_string())))?;
        for (name, value) in &opts.headers {
            let name: tokio_tungstenite::tungstenite::http::HeaderName =
                name.parse().map_err(|_| {
                    crate::error::Error::Transport(TransportError::Transient(format!(
                        "invalid header name '{name}'"
                    )))
                })?;
            let value = value.parse().map_err(|_| {
                crate::error::Error::Transport(TransportError::Transient(format!(
                    "invalid header value for '{name}'"
                )))
            })?;
            request.headers_mut().insert(name, value);
        }

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| crate::error::Error::Transport(e.into()))?;
        let (sink, stream) = ws.split();
        Ok(Box::new(WsClientDuplex {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }))
    }
}

#[async_trait]
impl RawDuplex for WsClientDuplex {
    async fn send(&self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(s) => WsMessage::Text(s),
            Frame::Binary(b) => WsMessage::Binary(b),
        };
        self.sink.lock().await.send(message).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Frame>> {
        loop {
            let next = self.stream.lock().await.next().await;
            return match next {
                None => Ok(None),
                Some(Ok(WsMessage::Text(s))) => Ok(Some(Frame::Text(s))),
                Some(Ok(WsMessage::Binary(b))) => Ok(Some(Frame::Binary(b))),
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) => Ok(None),
                Some(Ok(WsMessage::Frame(_))) => continue,
                Some(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)) => Ok(None),
                Some(Err(e)) => Err(e.into()),
            };
        }
    }

    async fn close(&self, code: u16) -> Result<()> {
        use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
        let _ = self
            .sink
            .lock()
            .await
            .send(WsMessage::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            })))
            .await;
        Ok(())
    }
}

/// An in-memory loopback pair of [`RawDuplex`]s, each end mirroring what the
/// other sends. Lets the channel, client wrapper and server endpoint be
/// exercised deterministically without a real socket.
pub fn duplex_pair() -> (InMemoryDuplex, InMemoryDuplex) {
    let (tx_a, rx_b) = mpsc::unbounded_channel();
    let (tx_b, rx_a) = mpsc::unbounded_channel();
    (
        InMemoryDuplex {
            tx: tx_a,
            rx: Mutex::new(rx_a),
        },
        InMemoryDuplex {
            tx: tx_b,
            rx: Mutex::new(rx_b),
        },
    )
}

pub struct InMemoryDuplex {
    tx: mpsc::UnboundedSender<Frame>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

#[async_trait]
impl RawDuplex for InMemoryDuplex {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| crate::error::Error::Closed)
    }

    async fn recv(&self) -> Result<Option<Frame>> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self, _code: u16) -> Result<()> {
        let mut rx = self.rx.lock().await;
        rx.close();
        Ok(())
    }
}
