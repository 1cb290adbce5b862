//! Log macros and an environment-selected `tracing` backend shared by
//! `chanrpc-core` and the demo binaries.
//!
//! `log_info!`/`log_debug!`/etc. behave like `println!`, with an optional
//! [`Sink`] installed via [`pipe`] to redirect output (useful for tests that
//! want to assert on emitted messages). [`backend::init`] wires up a real
//! `tracing` subscriber, selected by the `CHANRPC_LOGGING` environment
//! variable, for everything logged through the `tracing` macros elsewhere in
//! the workspace.

extern crate self as chanrpc_log;

pub mod backend;
pub mod sink;

pub use backend::{init, init_with_filter, LoggingBackend};
pub use log::{Level, LevelFilter};
pub use sink::{format_hex, log_level_enabled, pipe, set_log_level, trace_hex, Sink};

pub mod prelude {
    pub use crate::*;
}
