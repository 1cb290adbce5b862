//! Environment-selected `tracing` backend.
//!
//! Reads `CHANRPC_LOGGING` at startup and wires up a `tracing_subscriber::fmt`
//! layer with the matching formatter. Mirrors the shape of a single
//! environment-variable logging switch, generalized from a string-keyed
//! enum with a documented default to a real `tracing_subscriber` formatter
//! per variant.

use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_VAR: &str = "CHANRPC_LOGGING";

/// Selects which `tracing_subscriber::fmt` formatter backs the process-wide
/// subscriber, or disables logging output entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingBackend {
    /// No subscriber is installed; `tracing` events are dropped.
    Off,
    /// `tracing_subscriber::fmt().compact()` — single line per event.
    #[default]
    Compact,
    /// `tracing_subscriber::fmt().pretty()` — multi-line, human-oriented.
    Pretty,
    /// `tracing_subscriber::fmt().json()` — structured, machine-parseable.
    Json,
}

impl LoggingBackend {
    /// Resolves the backend from `CHANRPC_LOGGING`, defaulting to
    /// [`LoggingBackend::Compact`] when unset or unrecognized.
    pub fn from_env() -> Self {
        match env::var(ENV_VAR).unwrap_or_default().to_uppercase().as_str() {
            "OFF" => LoggingBackend::Off,
            "PRETTY" => LoggingBackend::Pretty,
            "JSON" => LoggingBackend::Json,
            "COMPACT" => LoggingBackend::Compact,
            _ => LoggingBackend::Compact,
        }
    }
}

/// Installs a process-wide `tracing` subscriber per [`LoggingBackend::from_env`].
///
/// Safe to call more than once per process; later calls are no-ops (mirrors
/// `tracing_subscriber`'s own "first call wins" global-default semantics).
pub fn init() {
    init_with_filter("chanrpc=debug,info");
}

/// Like [`init`] but with an explicit default `EnvFilter` directive, overridden
/// by `RUST_LOG` when present.
pub fn init_with_filter(default_directive: &str) {
    let backend = LoggingBackend::from_env();
    if backend == LoggingBackend::Off {
        return;
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = match backend {
        LoggingBackend::Compact => registry.with(fmt::layer().compact()).try_init(),
        LoggingBackend::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LoggingBackend::Json => registry.with(fmt::layer().json()).try_init(),
        LoggingBackend::Off => unreachable!(),
    };
}
