//!
//! Axum glue for `chanrpc-core`'s server endpoint (SPEC_FULL.md §4.5 / §2
//! component 8). Translates an already-accepted `axum::extract::ws::WebSocket`
//! into the [`chanrpc_core::RawDuplex`] contract and runs the channel's read
//! loop until disconnect. No RPC semantics live here — this crate exists
//! solely so `chanrpc-core` never depends on `axum`.
//!

use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use chanrpc_core::{
    Callbacks, Channel, Error, Frame, MethodRegistry, RawDuplex, Result, Socket,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Whether the endpoint speaks text or binary frames to inbound sockets.
/// Both carry the same JSON bytes; only the wire framing differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameType {
    #[default]
    Text,
    Binary,
}

/// Wraps an accepted `axum` `WebSocket` as a [`RawDuplex`], routing
/// `send`/`recv` through text or binary frames per `frame_type`.
struct AxumDuplex {
    socket: AsyncMutex<WebSocket>,
    frame_type: FrameType,
}

#[async_trait]
impl RawDuplex for AxumDuplex {
    async fn send(&self, frame: Frame) -> Result<()> {
        let message = match (self.frame_type, frame) {
            (FrameType::Text, Frame::Text(s)) => AxumMessage::Text(s.into()),
            (FrameType::Text, Frame::Binary(b)) => {
                AxumMessage::Text(String::from_utf8_lossy(&b).into_owned().into())
            }
            (FrameType::Binary, frame) => AxumMessage::Binary(frame.into_bytes().into()),
        };
        self.socket
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| Error::Handler(format!("axum websocket send failed: {e}")))
    }

    async fn recv(&self) -> Result<Option<Frame>> {
        loop {
            let next = self.socket.lock().await.recv().await;
            return match next {
                None => Ok(None),
                Some(Ok(AxumMessage::Text(s))) => Ok(Some(Frame::Text(s.to_string()))),
                Some(Ok(AxumMessage::Binary(b))) => Ok(Some(Frame::Binary(b.to_vec()))),
                Some(Ok(AxumMessage::Ping(_))) | Some(Ok(AxumMessage::Pong(_))) => continue,
                Some(Ok(AxumMessage::Close(_))) => Ok(None),
                Some(Err(e)) => Err(Error::Handler(format!("axum websocket recv failed: {e}"))),
            };
        }
    }

    async fn close(&self, _code: u16) -> Result<()> {
        let mut socket = self.socket.lock().await;
        let _ = socket.send(AxumMessage::Close(None)).await;
        Ok(())
    }
}

type FallibleCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type ChannelCreatedCallback = Arc<dyn Fn(Arc<Channel>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Tracks live inbound sockets. Process-wide mutable, so add/remove is
/// guarded by a plain `std::sync::Mutex` — per SPEC_FULL.md §5, a simple
/// mutex suffices since the critical section never awaits.
#[derive(Default)]
struct ConnectionManager {
    live: Mutex<HashSet<u64>>,
}

impl ConnectionManager {
    fn register(&self, id: u64) {
        self.live.lock().unwrap().insert(id);
    }

    fn deregister(&self, id: u64) {
        self.live.lock().unwrap().remove(&id);
    }

    fn count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

/// Construction-time options for [`ServerEndpoint`].
#[derive(Default)]
pub struct ServerEndpointOptions {
    pub registry: MethodRegistry,
    pub frame_type: FrameType,
    pub sync_channel_id: bool,
    pub on_connect: Vec<FallibleCallback>,
    pub on_disconnect: Vec<FallibleCallback>,
    pub on_channel_created: Vec<ChannelCreatedCallback>,
}

/// Accepts inbound connections from axum, wraps each as a transport,
/// constructs a channel per connection, and runs the read loop until
/// disconnect. One `ServerEndpoint` is typically shared (behind an `Arc`)
/// across every websocket route in a router.
pub struct ServerEndpoint {
    registry: MethodRegistry,
    frame_type: FrameType,
    sync_channel_id: bool,
    manager: ConnectionManager,
    on_connect: Vec<FallibleCallback>,
    on_disconnect: Vec<FallibleCallback>,
    on_channel_created: Vec<ChannelCreatedCallback>,
    next_conn_id: AtomicU64,
}

impl ServerEndpoint {
    pub fn new(options: ServerEndpointOptions) -> Arc<ServerEndpoint> {
        Arc::new(ServerEndpoint {
            registry: options.registry,
            frame_type: options.frame_type,
            sync_channel_id: options.sync_channel_id,
            manager: ConnectionManager::default(),
            on_connect: options.on_connect,
            on_disconnect: options.on_disconnect,
            on_channel_created: options.on_channel_created,
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Number of currently live inbound sockets.
    pub fn connection_count(&self) -> usize {
        self.manager.count()
    }

    /// Runs one inbound connection to completion: registers it, wraps it as
    /// a transport and channel, fires lifecycle callbacks, and loops
    /// `recv`/dispatch until the peer disconnects or an error occurs.
    /// `context` becomes the channel's user-supplied context bag.
    pub async fn main_loop(self: &Arc<Self>, ws: WebSocket, context: HashMap<String, Value>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        self.manager.register(conn_id);

        let transport = AxumDuplex {
            socket: AsyncMutex::new(ws),
            frame_type: self.frame_type,
        };
        let socket = Socket::new(Box::new(transport));

        let callbacks = Callbacks {
            on_connect: self.on_connect.clone(),
            on_disconnect: self.on_disconnect.clone(),
            on_error: Vec::new(),
        };
        let channel = Channel::new(self.registry.clone(), socket, context, callbacks);

        for cb in &self.on_channel_created {
            cb(channel.clone()).await;
        }

        channel.mark_connected().await;
        info!(channel_id = %channel.id(), conn_id, "inbound channel connected");

        if self.sync_channel_id {
            let channel = channel.clone();
            tokio::spawn(async move {
                let proxy = chanrpc_core::Proxy::new(channel.clone(), std::time::Duration::from_secs(5));
                match proxy.get_channel_id().await {
                    Ok(remote_id) => channel.set_remote_id(remote_id),
                    Err(err) => warn!(channel_id = %channel.id(), error = %err, "sync_channel_id exchange failed"),
                }
            });
        }

        loop {
            match channel.recv_and_dispatch().await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    debug!(channel_id = %channel.id(), conn_id, "peer closed connection");
                    break;
                }
                Err(err) => {
                    warn!(channel_id = %channel.id(), conn_id, error = %err, "dispatch error; closing channel");
                    break;
                }
            }
        }

        channel.close().await;
        self.manager.deregister(conn_id);
        info!(channel_id = %channel.id(), conn_id, "inbound channel disconnected");
    }
}
