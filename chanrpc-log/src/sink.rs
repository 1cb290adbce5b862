use downcast::{downcast_sync, AnySync};
use lazy_static::lazy_static;
use log::{Level, LevelFilter};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A log sink trait that can be installed into the log subsystem using [`pipe`]
/// and will receive all log messages.
pub trait Sink: AnySync {
    fn write(&self, target: Option<&str>, level: Level, args: &fmt::Arguments<'_>) -> bool;
}

downcast_sync!(dyn Sink);

struct SinkHandler {
    sink: Arc<dyn Sink>,
}

lazy_static! {
    static ref LEVEL_FILTER: Mutex<LevelFilter> = Mutex::new(LevelFilter::Trace);
    static ref SINK: Mutex<Option<SinkHandler>> = Mutex::new(None);
}

/// Returns true if `level` passes the currently configured [`LevelFilter`].
#[inline(always)]
pub fn log_level_enabled(level: Level) -> bool {
    *LEVEL_FILTER.lock().unwrap() >= level
}

/// Sets the global [`LevelFilter`] used by the `log_*!` macros.
pub fn set_log_level(level: LevelFilter) {
    *LEVEL_FILTER.lock().unwrap() = level;
}

/// Installs (or, with `None`, removes) a [`Sink`] that receives every
/// message emitted via the `log_*!` macros before it reaches stdout.
pub fn pipe(sink: Option<Arc<dyn Sink>>) {
    *SINK.lock().unwrap() = sink.map(|sink| SinkHandler { sink });
}

#[inline(always)]
fn to_sink(target: Option<&str>, level: Level, args: &fmt::Arguments<'_>) -> bool {
    match SINK.lock().unwrap().as_ref() {
        Some(handler) => handler.sink.write(target, level, args),
        None => false,
    }
}

pub mod impls {
    use super::*;

    macro_rules! impl_level {
        ($name:ident, $level:expr) => {
            #[inline(always)]
            pub fn $name(target: Option<&str>, args: &fmt::Arguments<'_>) {
                if log_level_enabled($level) && !to_sink(target, $level, args) {
                    println!("{args}");
                }
            }
        };
    }

    impl_level!(error_impl, Level::Error);
    impl_level!(warn_impl, Level::Warn);
    impl_level!(info_impl, Level::Info);
    impl_level!(debug_impl, Level::Debug);
    impl_level!(trace_impl, Level::Trace);
}

/// Format and log message at [`Level::Error`].
#[macro_export]
macro_rules! log_error {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::sink::impls::error_impl(Some($target), &format_args!($($arg)+))
    );
    ($($t:tt)*) => (
        $crate::sink::impls::error_impl(None, &format_args!($($t)*))
    )
}

/// Format and log message at [`Level::Warn`].
#[macro_export]
macro_rules! log_warning {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::sink::impls::warn_impl(Some($target), &format_args!($($arg)+))
    );
    ($($t:tt)*) => (
        $crate::sink::impls::warn_impl(None, &format_args!($($t)*))
    )
}

/// Format and log message at [`Level::Info`].
#[macro_export]
macro_rules! log_info {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::sink::impls::info_impl(Some($target), &format_args!($($arg)+))
    );
    ($($t:tt)*) => (
        $crate::sink::impls::info_impl(None, &format_args!($($t)*))
    )
}

/// Format and log message at [`Level::Debug`].
#[macro_export]
macro_rules! log_debug {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::sink::impls::debug_impl(Some($target), &format_args!($($arg)+))
    );
    ($($t:tt)*) => (
        $crate::sink::impls::debug_impl(None, &format_args!($($t)*))
    )
}

/// Format and log message at [`Level::Trace`].
#[macro_export]
macro_rules! log_trace {
    (target: $target:expr, $($arg:tt)+) => (
        $crate::sink::impls::trace_impl(Some($target), &format_args!($($arg)+))
    );
    ($($t:tt)*) => (
        $crate::sink::impls::trace_impl(None, &format_args!($($t)*))
    )
}

/// Prints (using [`log_trace`]) a data slice formatted as a hex dump.
pub fn trace_hex(data: &[u8]) {
    log_trace!("{}", format_hex(data));
}

/// Returns a string formatted as a hex data dump of the supplied slice.
pub fn format_hex(data: &[u8]) -> String {
    let view = hexplay::HexViewBuilder::new(data)
        .address_offset(0)
        .row_width(16)
        .finish();
    format!("{view}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Mutex<Vec<String>>);
    impl Sink for Recorder {
        fn write(&self, _target: Option<&str>, _level: Level, args: &fmt::Arguments<'_>) -> bool {
            self.0.lock().unwrap().push(args.to_string());
            true
        }
    }

    #[test]
    fn sink_receives_messages() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        pipe(Some(recorder.clone()));
        log_info!("hello {}", "world");
        assert_eq!(recorder.0.lock().unwrap().as_slice(), ["hello world"]);
        pipe(None);
    }
}
