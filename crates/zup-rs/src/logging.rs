use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter, e.g. `ZUP_LOG=debug`.
pub const LOG_ENV: &str = "ZUP_LOG";

/// Initialize `tracing` on stderr, leaving zig's stdout untouched. Defaults to `warn`.
///
/// Calling this more than once, or after another subscriber was installed, is a no-op.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
