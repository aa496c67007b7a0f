//! Structured logging: a `tracing` subscriber for normal diagnostics, plus a
//! thin systemd journal wrapper for events worth surfacing outside the
//! process's own log stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once if a write to the journal has failed, so repeated failures don't
/// spam stderr.
static EMITTED_JOURNAL_ERROR: AtomicBool = AtomicBool::new(false);

/// Install the default `tracing` subscriber: compact, untimed, targetless
/// output to stderr, filterable via `RUST_LOG`.
pub fn init_tracing() {
    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();
}

/// Structured journal write, a no-op outside a booted systemd environment.
pub fn journal_send<K, V>(
    priority: libsystemd::logging::Priority,
    msg: &str,
    vars: impl Iterator<Item = (K, V)>,
) where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if !libsystemd::daemon::booted() {
        return;
    }
    if let Err(e) = libsystemd::logging::journal_send(priority, msg, vars) {
        if !EMITTED_JOURNAL_ERROR.swap(true, Ordering::SeqCst) {
            eprintln!("failed to write to journal: {e}");
        }
    }
}

/// Plain-message journal write.
pub fn journal_print(priority: libsystemd::logging::Priority, msg: &str) {
    let vars: HashMap<&str, &str> = HashMap::new();
    journal_send(priority, msg, vars.into_iter())
}
