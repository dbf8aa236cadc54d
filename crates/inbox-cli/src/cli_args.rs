use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "support-inbox",
    about = "Slack Home-tab support inbox over Socket Mode",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "slack-bot-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API (xoxb-...)"
    )]
    pub(crate) slack_bot_token: String,

    #[arg(
        long = "slack-app-token",
        env = "SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack Socket Mode app token (xapp-...)"
    )]
    pub(crate) slack_app_token: String,

    #[arg(
        long = "slack-api-base",
        env = "INBOX_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub(crate) slack_api_base: String,

    #[arg(
        long = "preferences-path",
        env = "PREFERENCES_PATH",
        default_value = "./data/preferences.json",
        help = "JSON file holding per-user inbox preferences"
    )]
    pub(crate) preferences_path: PathBuf,

    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        default_value = "info",
        help = "Default log level (trace, debug, info, warn, error); RUST_LOG overrides it"
    )]
    pub(crate) log_level: String,

    #[arg(
        long = "request-timeout-ms",
        env = "INBOX_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for a single Slack Web API request"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "INBOX_RETRY_MAX_ATTEMPTS",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Attempts per Slack Web API call on 429/5xx and transport errors; 1 disables retries"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "INBOX_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff between retry attempts when Slack sends no Retry-After"
    )]
    pub(crate) retry_base_delay_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "INBOX_RECONNECT_DELAY_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Delay before reopening a dropped Socket Mode connection"
    )]
    pub(crate) reconnect_delay_ms: u64,

    #[arg(
        long = "message-cache-ttl-seconds",
        env = "INBOX_MESSAGE_CACHE_TTL_SECONDS",
        default_value_t = 300,
        value_parser = parse_positive_u64,
        help = "Lifetime of a cached channel message list"
    )]
    pub(crate) message_cache_ttl_seconds: u64,

    #[arg(
        long = "lookup-cache-ttl-seconds",
        env = "INBOX_LOOKUP_CACHE_TTL_SECONDS",
        default_value_t = 600,
        value_parser = parse_positive_u64,
        help = "Lifetime of cached user and channel names"
    )]
    pub(crate) lookup_cache_ttl_seconds: u64,

    #[arg(
        long = "history-fetch-limit",
        env = "INBOX_HISTORY_FETCH_LIMIT",
        default_value_t = 50,
        value_parser = parse_positive_usize,
        help = "Messages fetched per channel on a cache miss"
    )]
    pub(crate) history_fetch_limit: usize,

    #[arg(
        long = "publish-debounce-ms",
        env = "INBOX_PUBLISH_DEBOUNCE_MS",
        default_value_t = 3_000,
        value_parser = parse_positive_u64,
        help = "Quiet period before a background Home-tab refresh is published"
    )]
    pub(crate) publish_debounce_ms: u64,

    #[arg(
        long = "active-window-ms",
        env = "INBOX_ACTIVE_WINDOW_MS",
        default_value_t = 600_000,
        value_parser = parse_positive_u64,
        help = "How recently a user must have opened the Home tab to receive live refreshes"
    )]
    pub(crate) active_window_ms: u64,

    #[arg(
        long = "preferences-flush-delay-ms",
        env = "INBOX_PREFERENCES_FLUSH_DELAY_MS",
        default_value_t = 2_000,
        value_parser = parse_positive_u64,
        help = "Delay between a preferences change and writing the preferences file"
    )]
    pub(crate) preferences_flush_delay_ms: u64,
}
