//! Real-TCP scenarios that genuinely need an HTTP layer: forbidden auth
//! (scenario 5) and the channel-id exchange driven by `ServerEndpoint`'s
//! `sync_channel_id` flag (scenario 3), per SPEC_FULL.md §8.1.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chanrpc_axum::{FrameType, ServerEndpoint, ServerEndpointOptions};
use chanrpc_core::transport::{ConnectOptions, WsClientTransportFactory};
use chanrpc_core::{Client, ClientOptions, Error, MethodRegistry, RetryConfig, TransportError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const AUTH_HEADER: &str = "x-agent-token";

async fn guarded_ws_handler(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(endpoint): State<Arc<ServerEndpoint>>,
) -> Response {
    if !headers.contains_key(AUTH_HEADER) {
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| async move {
        endpoint.main_loop(socket, HashMap::new()).await;
    })
    .into_response()
}

async fn spawn_guarded_server() -> SocketAddr {
    let endpoint = ServerEndpoint::new(ServerEndpointOptions {
        registry: MethodRegistry::new(),
        frame_type: FrameType::Text,
        sync_channel_id: true,
        ..Default::default()
    });
    let app = Router::new()
        .route("/ws", get(guarded_ws_handler))
        .with_state(endpoint);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn forbidden_auth_is_not_retried() {
    let addr = spawn_guarded_server().await;
    let uri = format!("ws://{addr}/ws");

    let result = Client::connect(
        &uri,
        Arc::new(WsClientTransportFactory),
        ClientOptions {
            retry: RetryConfig::default(),
            ..Default::default()
        },
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Forbidden(_))));
}

#[tokio::test]
async fn client_with_header_succeeds() {
    let addr = spawn_guarded_server().await;
    let uri = format!("ws://{addr}/ws");

    let mut client = Client::connect(
        &uri,
        Arc::new(WsClientTransportFactory),
        ClientOptions {
            retry: RetryConfig::disabled(),
            connect_opts: ConnectOptions {
                headers: vec![(AUTH_HEADER.to_string(), "secret".to_string())],
            },
            ..Default::default()
        },
    )
    .await
    .unwrap();

    client.other(Duration::from_secs(1)).ping().await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn channel_id_exchange_populates_remote_id_on_the_server_side() {
    let captured: Arc<std::sync::Mutex<Option<Arc<chanrpc_core::Channel>>>> =
        Arc::new(std::sync::Mutex::new(None));
    let captured_for_callback = captured.clone();

    let endpoint = ServerEndpoint::new(ServerEndpointOptions {
        registry: MethodRegistry::new(),
        frame_type: FrameType::Text,
        sync_channel_id: true,
        on_channel_created: vec![Arc::new(move |channel| {
            let captured = captured_for_callback.clone();
            Box::pin(async move {
                *captured.lock().unwrap() = Some(channel);
            })
        })],
        ..Default::default()
    });
    let app = Router::new()
        .route(
            "/ws",
            get(|ws: WebSocketUpgrade, State(endpoint): State<Arc<ServerEndpoint>>| async move {
                ws.on_upgrade(move |socket| async move {
                    endpoint.main_loop(socket, HashMap::new()).await;
                })
            }),
        )
        .with_state(endpoint.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let uri = format!("ws://{addr}/ws");
    let mut client = Client::connect(
        &uri,
        Arc::new(WsClientTransportFactory),
        ClientOptions {
            retry: RetryConfig::disabled(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let client_id = client.channel().id();

    // The server learns the client's id asynchronously right after connect;
    // poll until it lands rather than assuming a fixed delay suffices.
    let server_channel = loop {
        if let Some(channel) = captured.lock().unwrap().clone() {
            break channel;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    for _ in 0..200 {
        if server_channel.remote_id() == Some(client_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server_channel.remote_id(), Some(client_id));

    client.disconnect().await;
}
