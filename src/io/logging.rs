use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`warn`, `boardflow=debug`, ...)
pub const LOG_ENV: &str = "BF_LOG";

/// Install the stderr subscriber for the `bf` binary. Filter comes from
/// `BF_LOG`, defaulting to `warn` (`debug` with `verbose`).
/// Calling it twice is harmless.
pub fn init(verbose: bool) {
    let default = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
