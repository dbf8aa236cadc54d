use std::time::Duration;

use anyhow::{bail, Result};
use inbox_slack_runtime::{
    InboxTuning, MessageServiceConfig, PublishConfig, SupportInboxRuntimeConfig,
    DEFAULT_THREAD_REPLY_LIMIT,
};

use crate::cli_args::Cli;

fn required_token(value: &str, flag: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} must not be empty");
    }
    Ok(trimmed.to_string())
}

pub(crate) fn build_runtime_config(cli: &Cli) -> Result<SupportInboxRuntimeConfig> {
    let bot_token = required_token(&cli.slack_bot_token, "--slack-bot-token")?;
    let app_token = required_token(&cli.slack_app_token, "--slack-app-token")?;
    if cli.slack_api_base.trim().is_empty() {
        bail!("--slack-api-base must not be empty");
    }

    Ok(SupportInboxRuntimeConfig {
        api_base: cli.slack_api_base.trim().to_string(),
        app_token,
        bot_token,
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
        preferences_path: cli.preferences_path.clone(),
        preferences_flush_delay: Duration::from_millis(cli.preferences_flush_delay_ms),
        tuning: InboxTuning {
            message_cache_ttl: Duration::from_secs(cli.message_cache_ttl_seconds),
            lookup_cache_ttl: Duration::from_secs(cli.lookup_cache_ttl_seconds),
            messages: MessageServiceConfig {
                history_fetch_limit: cli.history_fetch_limit,
                thread_reply_limit: DEFAULT_THREAD_REPLY_LIMIT,
            },
            publish: PublishConfig {
                debounce_ms: cli.publish_debounce_ms,
                active_window_ms: cli.active_window_ms,
            },
        },
    })
}
