mod bootstrap_helpers;
mod bot_config;
mod bot_runtime;
mod cleanup;
mod cli_args;
mod conversation;
mod event_loader;
mod external_content;
mod issue_search;
mod run_driver;
#[cfg(test)]
mod test_support;
mod tool_dispatch;
mod tool_schemas;
mod vector_store_wait;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::bot_runtime::run_cli;
use crate::cli_args::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run_cli(cli).await
}
