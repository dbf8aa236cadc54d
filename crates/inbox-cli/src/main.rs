mod bootstrap_helpers;
mod cli_args;
mod runtime_config;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::runtime_config::build_runtime_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let config = build_runtime_config(&cli)?;
    tracing::info!(
        preferences_path = %config.preferences_path.display(),
        api_base = %config.api_base,
        "starting support inbox"
    );
    inbox_slack_runtime::run_support_inbox(config).await
}
