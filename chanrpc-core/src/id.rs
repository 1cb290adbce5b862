//!
//! 128-bit identifier used for both a channel's own `id` and the `call_id`
//! that ties a request to its response. Rendered on the wire as 32-character
//! lowercase hex, matching the fixed-width random tag the wire contract
//! specifies (see crate docs and `SPEC_FULL.md` §3.1).
//!

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Id([u8; 16]);

impl Id {
    /// Generates a new random id from a CSPRNG.
    pub fn new() -> Id {
        Id(rand::random())
    }

    pub fn new_from_slice(slice: &[u8]) -> Id {
        let mut data = [0u8; 16];
        let len = slice.len().min(16);
        data[..len].copy_from_slice(&slice[..len]);
        Id(data)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid id: expected 32 lowercase hex characters")]
pub struct IdParseError;

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 {
            return Err(IdParseError);
        }
        let mut data = [0u8; 16];
        for (i, chunk) in data.iter_mut().enumerate() {
            let byte_str = s.get(i * 2..i * 2 + 2).ok_or(IdParseError)?;
            *chunk = u8::from_str_radix(byte_str, 16).map_err(|_| IdParseError)?;
        }
        Ok(Id(data))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 32-character lowercase hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        Id::from_str(v).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex_string() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn display_is_32_lowercase_hex_chars() {
        let id = Id::new();
        let s = id.to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn round_trips_through_json() {
        let id = Id::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn two_random_ids_differ() {
        assert_ne!(Id::new(), Id::new());
    }
}
