//! End-to-end scenarios over the in-memory loopback transport (echo, ping,
//! timeout, keep-alive recovery) per SPEC_FULL.md §8. Scenarios requiring a
//! real HTTP layer (channel-id sync, forbidden auth) live in
//! `chanrpc-axum/tests` instead.

use async_trait::async_trait;
use chanrpc_core::transport::{duplex_pair, ConnectOptions, InMemoryDuplex, RawDuplex};
use chanrpc_core::{Callbacks, Channel, Client, ClientOptions, Error, MethodRegistry, RetryConfig, Socket};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Deserialize)]
struct EchoArgs {
    text: String,
}

fn server_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry.method::<EchoArgs, String, _>("echo", "str", |_c, args| {
        Box::pin(async move { Ok(args.text) })
    });
    registry
}

/// Hands out one pre-built end of an in-memory duplex pair per call,
/// letting a test drive `Client::connect` against a loopback server side it
/// already spun up.
struct OneShotFactory(Mutex<Option<Box<dyn RawDuplex>>>);

impl OneShotFactory {
    fn new(duplex: InMemoryDuplex) -> Self {
        OneShotFactory(Mutex::new(Some(Box::new(duplex))))
    }
}

#[async_trait]
impl chanrpc_core::TransportFactory for OneShotFactory {
    async fn connect(&self, _uri: &str, _opts: &ConnectOptions) -> chanrpc_core::Result<Box<dyn RawDuplex>> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Handler("transport already consumed".into()))
    }
}

/// Runs a bare server-side channel (no `ServerEndpoint`/axum needed) over
/// the given transport half, dispatching inbound requests until the peer
/// disconnects.
fn spawn_server_channel(transport: InMemoryDuplex, registry: MethodRegistry) -> Arc<Channel> {
    let channel = Channel::new(
        registry,
        Socket::new(Box::new(transport)),
        HashMap::new(),
        Callbacks::default(),
    );
    let server_channel = channel.clone();
    tokio::spawn(async move {
        while let Ok(Some(())) = server_channel.recv_and_dispatch().await {}
    });
    channel
}

#[tokio::test]
async fn scenario_echo() {
    let (client_side, server_side) = duplex_pair();
    let _server_channel = spawn_server_channel(server_side, server_registry());

    let mut client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut args = HashMap::new();
    args.insert("text".to_string(), json!("hi"));
    let response = client
        .other(Duration::from_secs(1))
        .call_method("echo", args)
        .await
        .unwrap();

    assert_eq!(response.result, json!("hi"));
    assert_eq!(response.result_type, "str");

    client.disconnect().await;
}

#[tokio::test]
async fn scenario_ping_builtin() {
    let (client_side, server_side) = duplex_pair();
    let _server_channel = spawn_server_channel(server_side, MethodRegistry::new());

    let mut client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    client.other(Duration::from_secs(1)).ping().await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn scenario_timeout_leaves_channel_usable() {
    let mut registry = MethodRegistry::new();
    registry.method::<EchoArgs, String, _>("slow", "str", |_c, _args| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        })
    });

    let (client_side, server_side) = duplex_pair();
    let _server_channel = spawn_server_channel(server_side, registry);

    let mut client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut args = HashMap::new();
    args.insert("text".to_string(), json!("x"));
    let err = client
        .other(Duration::from_millis(100))
        .call_method("slow", args)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));

    // Channel still accepts further calls afterward.
    client.other(Duration::from_secs(1)).ping().await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn scenario_keep_alive_recovery_fires_disconnect_once() {
    let (client_side, server_side) = duplex_pair();

    // Server side is dropped entirely ("killed"), so the client's reader
    // will observe `recv() == None` the moment it tries to read.
    drop(server_side);

    let mut client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            keep_alive: Some(Duration::from_millis(20)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Give the reader a moment to observe the closed transport and close
    // the channel exactly once.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.channel().is_closed());
    client.disconnect().await;
}

#[tokio::test]
async fn no_response_sentinel_suppresses_the_reply() {
    let mut registry = MethodRegistry::new();
    registry.method_with_reply::<EchoArgs, _>("silent", "str", |_c, _args| {
        Box::pin(async move { Ok(chanrpc_core::Reply::Suppress) })
    });

    let (client_side, server_side) = duplex_pair();
    let _server_channel = spawn_server_channel(server_side, registry);

    let mut client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut args = HashMap::new();
    args.insert("text".to_string(), json!("x"));
    let err = client
        .other(Duration::from_millis(100))
        .call_method("silent", args)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
    client.disconnect().await;
}

#[tokio::test]
async fn call_id_uniqueness_within_one_channel() {
    let (client_side, server_side) = duplex_pair();
    let _server_channel = spawn_server_channel(server_side, server_registry());

    let client = Client::connect(
        "ws://test",
        Arc::new(OneShotFactory::new(client_side)),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut ids = std::collections::HashSet::new();
    for _ in 0..50 {
        let pending = client
            .channel()
            .async_call("echo", HashMap::from([("text".to_string(), json!("x"))]))
            .await
            .unwrap();
        assert!(ids.insert(pending.call_id()));
        client
            .channel()
            .wait_for_response(pending, Duration::from_secs(1))
            .await
            .unwrap();
    }
}
