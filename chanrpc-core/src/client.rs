//!
//! Client wrapper: owns a [`Channel`], runs the reader and (optional)
//! keep-alive tasks, and wraps connect with retry-with-backoff. Rust has no
//! async `Drop`, so lifecycle is explicit scoped acquisition — `Client::connect`
//! / `client.disconnect().await` — rather than the original's context-manager
//! `__aenter__`/`__aexit__`, per SPEC_FULL.md §4.4.
//!

use crate::channel::{Callbacks, Channel};
use crate::error::{Error, Result};
use crate::proxy::Proxy;
use crate::registry::MethodRegistry;
use crate::retry::{with_retry, RetryConfig};
use crate::socket::Socket;
use crate::transport::{ConnectOptions, TransportFactory};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type FallibleCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Arc<Error>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Construction-time options for [`Client::connect`]. Plain field-init plus
/// `Default`, matching the teacher's `Options<'url>` builder idiom rather
/// than a derive-heavy typed-builder crate.
pub struct ClientOptions {
    pub registry: MethodRegistry,
    pub retry: RetryConfig,
    pub default_response_timeout: Duration,
    pub keep_alive: Option<Duration>,
    pub connect_opts: ConnectOptions,
    pub context: HashMap<String, Value>,
    pub on_connect: Vec<FallibleCallback>,
    pub on_disconnect: Vec<FallibleCallback>,
    pub on_error: Vec<ErrorCallback>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            registry: MethodRegistry::new(),
            retry: RetryConfig::default(),
            default_response_timeout: Duration::from_secs(30),
            keep_alive: None,
            connect_opts: ConnectOptions::default(),
            context: HashMap::new(),
            on_connect: Vec::new(),
            on_disconnect: Vec::new(),
            on_error: Vec::new(),
        }
    }
}

pub struct Client {
    uri: String,
    channel: Arc<Channel>,
    reader: Option<JoinHandle<()>>,
    keep_alive: Option<JoinHandle<()>>,
}

impl Client {
    /// Connects to `uri` via `factory`, retrying per `options.retry`,
    /// constructs the channel, spawns the reader and (if configured)
    /// keep-alive tasks, fires `on_connect`, and returns the running client.
    pub async fn connect(
        uri: impl Into<String>,
        factory: Arc<dyn TransportFactory>,
        options: ClientOptions,
    ) -> Result<Client> {
        let uri = uri.into();
        let ClientOptions {
            registry,
            retry,
            default_response_timeout,
            keep_alive,
            connect_opts,
            context,
            on_connect,
            on_disconnect,
            on_error,
        } = options;

        let socket = with_retry(&retry, || {
            let factory = factory.clone();
            let uri = uri.clone();
            let connect_opts = connect_opts.clone();
            async move {
                let transport = factory.connect(&uri, &connect_opts).await?;
                Ok(Socket::new(transport))
            }
        })
        .await?;

        let callbacks = Callbacks {
            on_connect,
            on_disconnect,
            on_error,
        };
        let channel = Channel::new(registry, socket, context, callbacks);
        channel.mark_connected().await;
        debug!(channel_id = %channel.id(), %uri, "client channel connected");

        let reader = spawn_reader(channel.clone());
        let keep_alive_handle = keep_alive.map(|interval| spawn_keep_alive(channel.clone(), interval, default_response_timeout));

        Ok(Client {
            uri,
            channel,
            reader: Some(reader),
            keep_alive: keep_alive_handle,
        })
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// A [`Proxy`] for calling methods on the remote peer, using `timeout`
    /// as the default per-call deadline.
    pub fn other(&self, timeout: Duration) -> Proxy {
        Proxy::new(self.channel.clone(), timeout)
    }

    /// Closes the channel, cancels the reader and keep-alive tasks, and
    /// fires `on_disconnect` exactly once (via [`Channel::close`]). The
    /// caller is responsible for invoking this on every exit path, same as
    /// the teacher's explicit `.shutdown()`.
    pub async fn disconnect(&mut self) {
        self.channel.close().await;
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        if let Some(handle) = self.keep_alive.take() {
            handle.abort();
        }
    }
}

fn spawn_reader(channel: Arc<Channel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match channel.recv_and_dispatch().await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    debug!(channel_id = %channel.id(), "transport closed; closing channel");
                    channel.close().await;
                    break;
                }
                Err(err) => {
                    warn!(channel_id = %channel.id(), error = %err, "reader dispatch error; closing channel");
                    channel.close().await;
                    break;
                }
            }
        }
    })
}

fn spawn_keep_alive(channel: Arc<Channel>, interval: Duration, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if channel.is_closed() {
                break;
            }
            let proxy = Proxy::new(channel.clone(), timeout);
            if let Err(err) = proxy.ping().await {
                // A failed ping surfaces via the reader's next recv -> None
                // once the transport actually notices the half-open
                // connection; we only log here, matching the design note
                // that keep-alive is a policy, not its own closing path.
                warn!(channel_id = %channel.id(), error = %err, "keep-alive ping failed");
            }
        }
    })
}
