//!
//! Pluggable wire serializer. `Codec` is object-safe (no generic methods) so
//! a `Socket` can hold `Arc<dyn Codec>` without threading a generic parameter
//! all the way through `Channel`. [`JsonCodec`] is the default and matches
//! the wire schema in `envelope.rs` exactly.
//!

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::transport::Frame;

/// Encodes/decodes a single [`Envelope`] to/from a wire [`Frame`]. A custom
/// codec can swap the serialization format (e.g. tagging extra types) while
/// leaving the rest of the channel untouched.
pub trait Codec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> Result<Frame>;
    fn decode(&self, frame: Frame) -> Result<Envelope>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Frame> {
        let text = serde_json::to_string(envelope).map_err(Error::Codec)?;
        Ok(Frame::Text(text))
    }

    fn decode(&self, frame: Frame) -> Result<Envelope> {
        let text = match frame {
            Frame::Text(s) => s,
            Frame::Binary(b) => String::from_utf8(b)
                .map_err(|e| Error::Handler(format!("binary frame is not valid utf-8: {e}")))?,
        };
        serde_json::from_str(&text).map_err(Error::Codec)
    }
}
