//! Minimal echo agent: exposes `echo(text: str) -> str` over a single
//! `/ws` route, grounded on the original's `research_agent.py` /
//! `base_agent.py` example pair (an agent class plus a tiny `uvicorn`
//! launcher) — here the "agent" is just the one handler and the launcher is
//! `axum::serve`.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chanrpc_axum::{FrameType, ServerEndpoint, ServerEndpointOptions};
use chanrpc_core::MethodRegistry;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Deserialize)]
struct EchoArgs {
    text: String,
}

fn build_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry.method::<EchoArgs, String, _>("echo", "str", |_channel, args| {
        Box::pin(async move { Ok(args.text) })
    });
    registry
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(endpoint): State<Arc<ServerEndpoint>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        endpoint.main_loop(socket, HashMap::new()).await;
    })
}

#[tokio::main]
async fn main() {
    chanrpc_log::init();

    let endpoint = ServerEndpoint::new(ServerEndpointOptions {
        registry: build_registry(),
        frame_type: FrameType::Text,
        sync_channel_id: true,
        ..Default::default()
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(endpoint);

    let port: u16 = std::env::var("ECHO_SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9001);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, "echo-server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
