//!
//! chanrpc-core: a bidirectional JSON-RPC runtime carried over a single
//! persistent duplex message stream. Either peer may invoke a method
//! exposed by the other and await a typed result; concurrent in-flight
//! calls on one connection are multiplexed, correlated, and individually
//! timed out.
//!
//! This crate is the channel itself — message schema, request/response
//! correlation, method dispatch, connect/disconnect lifecycle, keep-alive,
//! and the reconnect-with-retry client wrapper. It has no opinion on how an
//! inbound connection is accepted; `chanrpc-axum` supplies that for `axum`.
//!

pub mod channel;
pub mod client;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod id;
pub mod proxy;
pub mod registry;
pub mod retry;
pub mod socket;
pub mod sync;
pub mod transport;

pub use channel::{Callbacks, Channel, PendingCall};
pub use client::{Client, ClientOptions};
pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, Reply, Request, Response};
pub use error::{Error, Result, TransportError};
pub use id::Id;
pub use proxy::Proxy;
pub use registry::{ChannelHandle, MethodRegistry};
pub use retry::RetryConfig;
pub use socket::Socket;
pub use transport::{ConnectOptions, Frame, RawDuplex, TransportFactory};
