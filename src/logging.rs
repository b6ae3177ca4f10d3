use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "LEXIS_LOG";
const DEFAULT_LEVEL: &str = "warn";

pub fn log_filter() -> EnvFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
pub fn init_tracing() {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    // Ignore a second init from tests.
    let _ = tracing_subscriber::registry()
        .with(log_filter())
        .with(stderr_layer)
        .try_init();
}
