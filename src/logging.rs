//! Logging setup for the binaries.
//!
//! Library code only emits `tracing` events; the binaries install a `fmt`
//! subscriber filtered by `RUST_LOG`, defaulting to `abx_client=info`.
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "abx_client=info";

/// Install the global subscriber. `verbose` lowers the default to `debug`.
/// Calling it twice is harmless; the second install is ignored.
pub fn init(verbose: bool) {
    let default = if verbose { "abx_client=debug" } else { DEFAULT_DIRECTIVE };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
