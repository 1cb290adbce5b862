//!
//! Crate-wide [`enum@Error`] definition shared by the channel, client wrapper
//! and server endpoint.
//!

use thiserror::Error;

/// Errors surfaced while establishing a transport connection. Kept distinct
/// from [`enum@Error`] so the client wrapper's retry predicate can match on it
/// directly instead of duck-typing a nested status code.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer rejected the connection with HTTP 401 or 403. Never retried.
    #[error("connection forbidden: {0}")]
    Forbidden(String),

    /// Any other connect failure: DNS, refused, timed out, handshake error.
    /// Retried per the configured [`crate::client::RetryConfig`].
    #[error("transport error: {0}")]
    Transient(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match &err {
            WsError::Http(response) => {
                let status = response.status().as_u16();
                if status == 401 || status == 403 {
                    return TransportError::Forbidden(err.to_string());
                }
                TransportError::Transient(err.to_string())
            }
            _ => TransportError::Transient(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("inbound frame is not a valid envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("RPC call timed out")]
    Timeout,

    #[error("channel is closed")]
    Closed,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("method '{0}' is not exposed (underscored and not a built-in)")]
    ForbiddenMethod(String),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
