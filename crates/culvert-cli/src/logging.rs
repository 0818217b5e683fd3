use tracing_subscriber::{fmt, EnvFilter};

/// Initialize stderr logging.
///
/// `RUST_LOG` takes precedence, e.g. `RUST_LOG=culvert_core=trace`.
/// Without it the level is `info`, or `debug` with `--verbose`.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_line_number(verbose)
        .try_init();
}
