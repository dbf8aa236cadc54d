use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Default level when `--log-level` is not a recognised level name.
const FALLBACK_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

pub(crate) fn default_log_directive(log_level: &str) -> LevelFilter {
    log_level
        .trim()
        .parse::<LevelFilter>()
        .unwrap_or(FALLBACK_LOG_LEVEL)
}

/// Installs the global subscriber. `RUST_LOG` directives take precedence over
/// `log_level`.
pub(crate) fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_log_directive(log_level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
