//!
//! Serializing socket: wraps a raw [`RawDuplex`] transport, encoding outbound
//! [`Envelope`]s to wire [`Frame`]s and decoding inbound frames back to
//! envelopes through a pluggable [`Codec`]. `Channel` never touches a
//! transport or a frame directly — only a `Socket`.
//!

use crate::codec::{Codec, JsonCodec};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::transport::RawDuplex;
use std::sync::Arc;

pub struct Socket {
    transport: Box<dyn RawDuplex>,
    codec: Arc<dyn Codec>,
}

impl Socket {
    pub fn new(transport: Box<dyn RawDuplex>) -> Self {
        Socket::with_codec(transport, Arc::new(JsonCodec))
    }

    pub fn with_codec(transport: Box<dyn RawDuplex>, codec: Arc<dyn Codec>) -> Self {
        Socket { transport, codec }
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let frame = self.codec.encode(envelope)?;
        self.transport.send(frame).await
    }

    /// Reads the next frame and decodes it. `Ok(None)` means the peer closed
    /// normally — never surfaced as an error.
    pub async fn recv(&self) -> Result<Option<Envelope>> {
        match self.transport.recv().await? {
            None => Ok(None),
            Some(frame) => Ok(Some(self.codec.decode(frame)?)),
        }
    }

    pub async fn close(&self, code: u16) -> Result<()> {
        self.transport.close(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Request;
    use crate::id::Id;
    use crate::transport::duplex_pair;
    use std::collections::HashMap;

    #[tokio::test]
    async fn round_trips_an_envelope_over_a_loopback_transport() {
        let (a, b) = duplex_pair();
        let socket_a = Socket::new(Box::new(a));
        let socket_b = Socket::new(Box::new(b));

        let envelope = Envelope::request(Request {
            call_id: Id::new(),
            method: "echo".into(),
            arguments: HashMap::new(),
        });
        socket_a.send(&envelope).await.unwrap();
        let received = socket_b.recv().await.unwrap().unwrap();
        assert_eq!(received.request.unwrap().method, "echo");
    }

    #[tokio::test]
    async fn recv_returns_none_after_close() {
        let (a, b) = duplex_pair();
        let socket_a = Socket::new(Box::new(a));
        let socket_b = Socket::new(Box::new(b));
        socket_a.close(1000).await.unwrap();
        drop(socket_a);
        assert!(socket_b.recv().await.unwrap().is_none());
    }
}
