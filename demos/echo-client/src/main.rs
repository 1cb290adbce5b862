//! Connects to `echo-server`, pings it, calls `echo`, and prints the round
//! trip — the client-side half of the echo scenario in SPEC_FULL.md §8.

use chanrpc_core::{Client, ClientOptions};
use chanrpc_core::transport::WsClientTransportFactory;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    chanrpc_log::init();

    let port: u16 = std::env::var("ECHO_SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9001);
    let uri = format!("ws://127.0.0.1:{port}/ws");

    let mut client = Client::connect(
        &uri,
        Arc::new(WsClientTransportFactory),
        ClientOptions {
            keep_alive: Some(Duration::from_secs(30)),
            ..Default::default()
        },
    )
    .await
    .expect("connect to echo-server");

    let proxy = client.other(Duration::from_secs(5));

    proxy.ping().await.expect("ping");
    tracing::info!("ping ok");

    let mut args = std::collections::HashMap::new();
    args.insert("text".to_string(), json!("hello from echo-client"));
    let response = proxy
        .call_method("echo", args)
        .await
        .expect("echo call");
    tracing::info!(result = %response.result, result_type = %response.result_type, "echo response");

    client.disconnect().await;
}
