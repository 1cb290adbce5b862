//!
//! Method registry: a holder of named async handlers exposed to the remote
//! peer, plus the always-exposed built-ins `_ping_` and `_get_channel_id_`.
//!
//! A registry is supplied by the user before any channel exists, so it acts
//! as a prototype: [`MethodRegistry::clone`] produces a shallow copy (handler
//! map shared via `Arc`, back-reference cell fresh and empty) that the
//! channel binds to itself once constructed via [`MethodRegistry::bind`].
//!

use crate::envelope::Reply;
use crate::error::{Error, Result};
use crate::id::Id;
use ahash::AHashMap;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub const PING_RESPONSE: &str = "pong";

/// Argument type for handlers that take no parameters. `arguments` on the
/// wire is always a JSON object (possibly empty), and `()` only deserializes
/// from `null`, so built-ins and other zero-argument handlers use this
/// instead.
#[derive(serde::Deserialize)]
pub struct EmptyArgs {}

/// Names that may be called by the remote peer even though they start with
/// `_`. Mirrors the registry's own exposure rule.
pub const EXPOSED_BUILTIN_METHODS: &[&str] = &["_ping_", "_get_channel_id_"];

/// True iff `name` is callable by the remote peer: it does not start with
/// `_`, or it is on the built-in allow-list.
pub fn is_exposed(name: &str) -> bool {
    !name.starts_with('_') || EXPOSED_BUILTIN_METHODS.contains(&name)
}

/// A cheap, cloneable handle to the channel a registry has been bound to.
/// Handlers read this to learn the local channel id or the per-connection
/// user context; it deliberately does not expose the full `Channel` API to
/// avoid handlers reaching back into dispatch internals.
#[derive(Clone)]
pub struct ChannelHandle {
    pub(crate) id: Id,
    pub(crate) context: Arc<HashMap<String, Value>>,
}

impl ChannelHandle {
    pub fn id(&self) -> Id {
        self.id
    }

    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }
}

/// Informational tag used when a handler descriptor does not carry an
/// explicit return-type name (no runtime reflection on `Resp` is available).
pub const UNKNOWN_TYPE: &str = "unknown-type";

#[async_trait]
trait DynMethod: Send + Sync {
    async fn call(&self, channel: ChannelHandle, arguments: Value) -> Result<Reply>;

    /// The `result_type` tag carried on the wire for this method's replies.
    fn return_type(&self) -> &'static str {
        UNKNOWN_TYPE
    }
}

type HandlerFn<Args, Resp> =
    Arc<dyn Fn(ChannelHandle, Args) -> BoxFuture<'static, Result<Resp>> + Send + Sync>;

struct TypedMethod<Args, Resp> {
    handler: HandlerFn<Args, Resp>,
    return_type: &'static str,
}

#[async_trait]
impl<Args, Resp> DynMethod for TypedMethod<Args, Resp>
where
    Args: DeserializeOwned + Send + Sync + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    async fn call(&self, channel: ChannelHandle, arguments: Value) -> Result<Reply> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| Error::Handler(format!("argument deserialization failed: {e}")))?;
        let resp = (self.handler)(channel, args).await?;
        let value = serde_json::to_value(resp)
            .map_err(|e| Error::Handler(format!("result serialization failed: {e}")))?;
        Ok(Reply::Value(value))
    }

    fn return_type(&self) -> &'static str {
        self.return_type
    }
}

struct NoResponseMethod<Args> {
    handler: Arc<dyn Fn(ChannelHandle, Args) -> BoxFuture<'static, Result<Reply>> + Send + Sync>,
    return_type: &'static str,
}

#[async_trait]
impl<Args> DynMethod for NoResponseMethod<Args>
where
    Args: DeserializeOwned + Send + Sync + 'static,
{
    async fn call(&self, channel: ChannelHandle, arguments: Value) -> Result<Reply> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| Error::Handler(format!("argument deserialization failed: {e}")))?;
        (self.handler)(channel, args).await
    }

    fn return_type(&self) -> &'static str {
        self.return_type
    }
}

pub struct MethodRegistry {
    methods: Arc<AHashMap<String, Arc<dyn DynMethod>>>,
    channel: Arc<OnceLock<ChannelHandle>>,
}

/// Not derived: a clone shares the handler map (immutable once installed)
/// but must get its own, unbound back-reference cell. Each channel binds its
/// own clone of a shared prototype registry, so sharing the `OnceLock` here
/// would make the second `bind()` panic or silently observe the first
/// connection's channel.
impl Clone for MethodRegistry {
    fn clone(&self) -> Self {
        MethodRegistry {
            methods: self.methods.clone(),
            channel: Arc::new(OnceLock::new()),
        }
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut registry = MethodRegistry {
            methods: Arc::new(AHashMap::new()),
            channel: Arc::new(OnceLock::new()),
        };
        registry.install_builtins();
        registry
    }

    fn insert(&mut self, name: &str, method: Arc<dyn DynMethod>) {
        let map = Arc::get_mut(&mut self.methods)
            .expect("MethodRegistry::method must be called before the registry is cloned/bound");
        if map.insert(name.to_string(), method).is_some() {
            panic!("RPC method '{name}' is declared multiple times");
        }
    }

    fn install_builtins(&mut self) {
        self.method("_ping_", "str", |_channel, _args: EmptyArgs| {
            Box::pin(async { Ok(PING_RESPONSE.to_string()) })
        });
        self.method("_get_channel_id_", "str", |channel: ChannelHandle, _args: EmptyArgs| {
            Box::pin(async move { Ok(channel.id().to_string()) })
        });
    }

    /// Registers a handler that always replies. `return_type` is the
    /// informational tag carried on the wire as `result_type`.
    pub fn method<Args, Resp, F>(&mut self, name: &str, return_type: &'static str, handler: F)
    where
        Args: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
        F: Fn(ChannelHandle, Args) -> BoxFuture<'static, Result<Resp>> + Send + Sync + 'static,
    {
        self.insert(
            name,
            Arc::new(TypedMethod {
                handler: Arc::new(handler),
                return_type,
            }),
        );
    }

    /// Registers a handler that may suppress its reply by returning
    /// [`Reply::Suppress`] — the "no response" sentinel.
    pub fn method_with_reply<Args, F>(
        &mut self,
        name: &str,
        return_type: &'static str,
        handler: F,
    ) where
        Args: DeserializeOwned + Send + Sync + 'static,
        F: Fn(ChannelHandle, Args) -> BoxFuture<'static, Result<Reply>> + Send + Sync + 'static,
    {
        self.insert(
            name,
            Arc::new(NoResponseMethod {
                handler: Arc::new(handler),
                return_type,
            }),
        );
    }

    /// Binds this registry (a clone of a user-supplied prototype) to the
    /// channel it belongs to. Must be called at most once per clone.
    pub fn bind(&self, handle: ChannelHandle) {
        self.channel
            .set(handle)
            .unwrap_or_else(|_| panic!("MethodRegistry is already bound to a channel"));
    }

    pub fn channel(&self) -> &ChannelHandle {
        self.channel
            .get()
            .expect("MethodRegistry::bind must be called before dispatch")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|s| s.as_str())
    }

    /// Dispatches `name(arguments)`, rejecting underscored non-built-in names.
    /// Returns the reply together with its `result_type` wire tag.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<(Reply, &'static str)> {
        if !is_exposed(name) {
            return Err(Error::ForbiddenMethod(name.to_string()));
        }
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| Error::UnknownMethod(name.to_string()))?;
        let reply = method.call(self.channel().clone(), arguments).await?;
        Ok((reply, method.return_type()))
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
