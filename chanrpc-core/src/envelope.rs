//!
//! Wire schema: [`Envelope`] carries exactly one of [`Request`] or
//! [`Response`]. Field names and shapes match the wire contract verbatim;
//! unknown fields are ignored by `serde`'s default struct deserialization.
//!

use crate::id::Id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub call_id: Id,
    pub method: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub call_id: Id,
    pub result: Value,
    pub result_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request: Option<Request>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response: Option<Response>,
}

impl Envelope {
    pub fn request(request: Request) -> Self {
        Envelope {
            request: Some(request),
            response: None,
        }
    }

    pub fn response(response: Response) -> Self {
        Envelope {
            request: None,
            response: Some(response),
        }
    }
}

/// The distinguished return value of a handler. Modeled as a real tagged
/// variant rather than an in-band JSON sentinel per the "no-response" design
/// note: [`Reply::Suppress`] means the channel sends nothing at all for that
/// call, leaving the caller's `call_id` open until it times out.
#[derive(Debug, Clone)]
pub enum Reply {
    Value(Value),
    Suppress,
}

impl Reply {
    pub fn value(value: impl Serialize) -> Reply {
        Reply::Value(serde_json::to_value(value).expect("handler return value must serialize"))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}
