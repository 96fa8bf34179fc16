//! Log setup for p2pctl.
//!
//! Logs go to stderr so `run --json` output stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `directive`, which may be a bare
/// level ("debug") or a full `EnvFilter` string ("p2pstream=trace,warn").
pub fn init(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("ignoring log filter '{}': {}", directive, e);
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
