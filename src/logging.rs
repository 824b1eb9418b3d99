use crate::cli::Logger;
use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` isn't set.
pub fn default_level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

/// Logs go to stderr. Stdout is reserved for the per-library summary lines.
pub fn init(verbose: u8, quiet: bool, logger: Logger) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match logger {
        Logger::Human => builder.init(),
        Logger::Machine => builder.json().init(),
    }
}
