//!
//! Remote proxy: the caller-side sugar that turns a named call into a
//! round-trip [`Channel::call`]. Rust has no runtime attribute lookup, so
//! `channel.other.foo(**kw)` becomes `proxy.call_method("foo", kw)` — the
//! generic escape hatch — plus inherent sugar methods for the two built-ins,
//! per SPEC_FULL.md §4.3.
//!

use crate::channel::Channel;
use crate::envelope::Response;
use crate::error::{Error, Result};
use crate::registry::{is_exposed, MethodRegistry, PING_RESPONSE};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Accessor on a [`Channel`] for calling methods on the remote peer.
/// Constructed via [`Channel::other`] (see `client.rs`/`server` glue) with a
/// default response timeout; [`Proxy::with_timeout`] overrides it per call.
pub struct Proxy {
    channel: Arc<Channel>,
    default_timeout: Duration,
    whitelist: Option<MethodRegistry>,
}

impl Proxy {
    pub fn new(channel: Arc<Channel>, default_timeout: Duration) -> Self {
        Proxy {
            channel,
            default_timeout,
            whitelist: None,
        }
    }

    /// Narrows the proxy to only the method names present in `whitelist` —
    /// a reference registry whose handler names form the allowed set.
    pub fn with_whitelist(mut self, whitelist: MethodRegistry) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn with_timeout(&self, timeout: Duration) -> Proxy {
        Proxy {
            channel: self.channel.clone(),
            default_timeout: timeout,
            whitelist: self.whitelist.clone(),
        }
    }

    /// Calls `name(arguments)` on the remote peer and waits up to this
    /// proxy's default timeout. Rejects underscored non-built-in names and
    /// names outside an optional whitelist before ever sending a frame.
    pub async fn call_method(&self, name: &str, arguments: HashMap<String, Value>) -> Result<Response> {
        if !is_exposed(name) {
            return Err(Error::ForbiddenMethod(name.to_string()));
        }
        if let Some(whitelist) = &self.whitelist {
            if !crate::registry::EXPOSED_BUILTIN_METHODS.contains(&name) && !whitelist.contains(name) {
                return Err(Error::UnknownMethod(name.to_string()));
            }
        }
        self.channel.call(name, arguments, self.default_timeout).await
    }

    /// `other._ping_()`, asserting the well-known `"pong"` reply.
    pub async fn ping(&self) -> Result<()> {
        let response = self.call_method("_ping_", HashMap::new()).await?;
        match response.result.as_str() {
            Some(PING_RESPONSE) => Ok(()),
            _ => Err(Error::Handler(format!(
                "unexpected ping reply: {}",
                response.result
            ))),
        }
    }

    /// `other._get_channel_id_()`, parsed back into an [`crate::id::Id`].
    pub async fn get_channel_id(&self) -> Result<crate::id::Id> {
        let response = self.call_method("_get_channel_id_", HashMap::new()).await?;
        let text = response
            .result
            .as_str()
            .ok_or_else(|| Error::Handler("_get_channel_id_ did not return a string".into()))?;
        text.parse()
            .map_err(|_| Error::Handler("_get_channel_id_ returned a malformed id".into()))
    }
}

impl Clone for Proxy {
    fn clone(&self) -> Self {
        Proxy {
            channel: self.channel.clone(),
            default_timeout: self.default_timeout,
            whitelist: self.whitelist.clone(),
        }
    }
}
