//!
//! The RPC channel: owns one [`Socket`], pairs outbound requests with
//! inbound responses, dispatches inbound requests to the bound
//! [`MethodRegistry`], and exposes the terminal close signal every waiter
//! and background task observes.
//!
//! Unlike the single-threaded-cooperative original, a `Channel` here may be
//! called from many concurrently running tasks at once, so the pending map
//! is a short-held `tokio::sync::Mutex` around an `AHashMap` — never held
//! across an `.await` — per the concurrency model in `SPEC_FULL.md` §5.
//!

use crate::envelope::{Envelope, Reply, Request, Response};
use crate::error::{Error, Result};
use crate::id::Id;
use crate::registry::{ChannelHandle, MethodRegistry};
use crate::socket::Socket;
use crate::sync::CloseSignal;
use ahash::AHashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, warn};

/// One outstanding outbound call: the `call_id` it was minted under and a
/// one-shot sender the reader writes the matching response into. Dropping
/// the receiver half (e.g. the waiter gave up) makes a late `send` a no-op.
struct Pending {
    reply_tx: oneshot::Sender<Response>,
}

/// A handle returned by [`Channel::async_call`]; await [`Channel::wait_for_response`]
/// with it, or drop it to abandon the call (the entry is cleaned up lazily
/// the next time the channel is touched, the same as an ordinary timeout).
pub struct PendingCall {
    call_id: Id,
    reply_rx: oneshot::Receiver<Response>,
}

impl PendingCall {
    pub fn call_id(&self) -> Id {
        self.call_id
    }
}

type FallibleCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Arc<Error>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_connect: Vec<FallibleCallback>,
    pub on_disconnect: Vec<FallibleCallback>,
    pub on_error: Vec<ErrorCallback>,
}

impl Callbacks {
    /// Fans every registered callback out via `join_all`; one failing
    /// callback must not prevent the others from running. Failures are
    /// logged, never propagated, matching the original's "gather-style"
    /// fan-out.
    async fn fire_fallible(callbacks: &[FallibleCallback], which: &'static str) {
        let results = futures::future::join_all(callbacks.iter().map(|cb| cb())).await;
        for result in results {
            if let Err(err) = result {
                error!(callback = which, error = %err, "channel callback failed");
            }
        }
    }

    pub async fn fire_connect(&self) {
        Callbacks::fire_fallible(&self.on_connect, "on_connect").await;
    }

    pub async fn fire_disconnect(&self) {
        Callbacks::fire_fallible(&self.on_disconnect, "on_disconnect").await;
    }

    pub async fn fire_error(&self, err: Arc<Error>) {
        futures::future::join_all(self.on_error.iter().map(|cb| cb(err.clone()))).await;
    }
}

pub struct Channel {
    id: Id,
    remote_id: StdMutex<Option<Id>>,
    registry: MethodRegistry,
    socket: Socket,
    pending: Mutex<AHashMap<Id, Pending>>,
    close: CloseSignal,
    connected: AtomicBool,
    disconnected_once: AtomicBool,
    callbacks: Callbacks,
}

impl Channel {
    pub fn new(
        registry: MethodRegistry,
        socket: Socket,
        context: HashMap<String, Value>,
        callbacks: Callbacks,
    ) -> Arc<Channel> {
        let id = Id::new();
        registry.bind(ChannelHandle {
            id,
            context: Arc::new(context),
        });
        Arc::new(Channel {
            id,
            remote_id: StdMutex::new(None),
            registry,
            socket,
            pending: Mutex::new(AHashMap::new()),
            close: CloseSignal::new(),
            connected: AtomicBool::new(false),
            disconnected_once: AtomicBool::new(false),
            callbacks,
        })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn remote_id(&self) -> Option<Id> {
        *self.remote_id.lock().unwrap()
    }

    pub fn set_remote_id(&self, id: Id) {
        *self.remote_id.lock().unwrap() = Some(id);
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_set()
    }

    pub fn close_listener(&self) -> crate::sync::Listener {
        self.close.listener.clone()
    }

    /// Fires `on_connect`, marks the channel connected. Must complete before
    /// any user-level call is permitted to complete (§3 invariant).
    pub async fn mark_connected(&self) {
        self.callbacks.fire_connect().await;
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Terminal close: fires the shared signal (releasing every blocked
    /// `wait_for_response`), closes the transport, and fires `on_disconnect`
    /// exactly once.
    pub async fn close(&self) {
        if self.disconnected_once.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close.fire();
        self.connected.store(false, Ordering::SeqCst);
        if let Err(err) = self.socket.close(1000).await {
            warn!(channel_id = %self.id, error = %err, "error closing transport");
        }
        self.callbacks.fire_disconnect().await;
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.socket.send(envelope).await
    }

    /// Reads and decodes the next frame off this channel's socket and
    /// routes it. `Ok(None)` means the transport closed normally. A codec
    /// error fires error callbacks and propagates to the caller (the
    /// client/server read loop), per §7's parse-error propagation policy.
    pub async fn recv_and_dispatch(self: &Arc<Self>) -> Result<Option<()>> {
        let envelope = match self.socket.recv().await {
            Ok(None) => return Ok(None),
            Ok(Some(envelope)) => envelope,
            Err(err) => {
                let err = Arc::new(err);
                self.callbacks.fire_error(err.clone()).await;
                return Err(Error::Handler(err.to_string()));
            }
        };
        self.on_message(envelope).await;
        Ok(Some(()))
    }

    /// Routes an already-decoded envelope: dispatches a request, or routes a
    /// response to its waiter.
    pub async fn on_message(self: &Arc<Self>, envelope: Envelope) {
        if let Some(request) = envelope.request {
            self.on_request(request).await;
        } else if let Some(response) = envelope.response {
            self.on_response(response).await;
        }
    }

    async fn on_request(self: &Arc<Self>, request: Request) {
        let call_id = request.call_id;
        let method = request.method.clone();
        debug!(channel_id = %self.id, %call_id, %method, "dispatching inbound request");
        let outcome = self.registry.dispatch(&method, Value::Object(
            request.arguments.into_iter().collect(),
        )).await;

        match outcome {
            Ok((Reply::Suppress, _)) => {}
            Ok((Reply::Value(result), result_type)) => {
                let response = Response {
                    call_id,
                    result,
                    result_type: result_type.to_string(),
                };
                if let Err(err) = self.send(&Envelope::response(response)).await {
                    warn!(channel_id = %self.id, %call_id, error = %err, "failed to send response");
                }
            }
            Err(err) => {
                warn!(channel_id = %self.id, %call_id, %method, error = %err, "inbound request failed; no response sent");
                self.callbacks.fire_error(Arc::new(err)).await;
            }
        }
    }

    async fn on_response(&self, response: Response) {
        let mut pending = self.pending.lock().await;
        if let Some(entry) = pending.remove(&response.call_id) {
            let _ = entry.reply_tx.send(response);
        } else {
            debug!(call_id = %response.call_id, "dropping response for unknown/expired call_id");
        }
    }

    /// Mints a `call_id`, records a [`Pending`] entry, sends the request and
    /// returns the handle the caller awaits via [`Channel::wait_for_response`].
    pub async fn async_call(&self, method: &str, arguments: HashMap<String, Value>) -> Result<PendingCall> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let call_id = Id::new();
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(call_id, Pending { reply_tx });
        }
        let request = Request {
            call_id,
            method: method.to_string(),
            arguments,
        };
        if let Err(err) = self.send(&Envelope::request(request)).await {
            self.pending.lock().await.remove(&call_id);
            return Err(err);
        }
        Ok(PendingCall { call_id, reply_rx })
    }

    /// Waits for either the pending call's response or the channel's
    /// terminal close signal, whichever fires first; always removes the
    /// `Pending` entry on the way out, success or failure.
    pub async fn wait_for_response(&self, pending: PendingCall, timeout: Duration) -> Result<Response> {
        let call_id = pending.call_id;
        let PendingCall { reply_rx, .. } = pending;
        let close = self.close.listener.clone();

        let outcome = tokio::select! {
            biased;
            result = reply_rx => result.map_err(|_| Error::Closed),
            _ = close => Err(Error::Closed),
            _ = tokio::time::sleep(timeout) => Err(Error::Timeout),
        };

        self.pending.lock().await.remove(&call_id);
        outcome
    }

    pub async fn call(
        &self,
        method: &str,
        arguments: HashMap<String, Value>,
        timeout: Duration,
    ) -> Result<Response> {
        let pending = self.async_call(method, arguments).await?;
        self.wait_for_response(pending, timeout).await
    }

    /// Number of calls currently awaiting a response. Exposed for tests
    /// asserting the "pending map is empty at steady state" invariant.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
