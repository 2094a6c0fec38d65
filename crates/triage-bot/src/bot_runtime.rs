use std::sync::Arc;

use anyhow::{Context, Result};
use triage_ai::{AssistantsClient, OpenAiAssistantsClient};
use triage_github::GithubApiClient;

use crate::bot_config::{github_api_config, openai_config, BotConfig};
use crate::cleanup::cleanup_vector_stores;
use crate::cli_args::{Cli, CliCommand, OpenAiArgs, RunArgs};
use crate::conversation::start_conversation;
use crate::event_loader::{resolve_event_issue, EventSource};
use crate::external_content::ExternalContentFetcher;
use crate::run_driver::{drive_run, RunReport};
use crate::tool_dispatch::ToolDispatcher;
use crate::tool_schemas::tool_definitions;
use crate::vector_store_wait::wait_for_vector_store;

const EXTERNAL_CONTENT_TIMEOUT_MS: u64 = 30_000;

fn build_assistants_client(args: &OpenAiArgs) -> Result<OpenAiAssistantsClient> {
    OpenAiAssistantsClient::new(openai_config(args)?)
        .context("failed to create assistants client")
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        CliCommand::ToolSchemas => {
            let rendered = serde_json::to_string_pretty(&tool_definitions())
                .context("failed to render tool definitions")?;
            println!("{rendered}");
            Ok(())
        }
        CliCommand::Cleanup(args) => {
            let client = build_assistants_client(&cli.openai)?;
            cleanup_vector_stores(&client, args.all).await?;
            Ok(())
        }
        CliCommand::Run(args) => {
            let client: Arc<dyn AssistantsClient> = Arc::new(build_assistants_client(&cli.openai)?);
            run_issue_triage(client, &args).await?;
            Ok(())
        }
    }
}

/// Handles one issue event end to end: load, open the thread, index, run, dispatch tools.
pub async fn run_issue_triage(
    assistants: Arc<dyn AssistantsClient>,
    args: &RunArgs,
) -> Result<RunReport> {
    let config = BotConfig::from_run_args(args)?;
    let source = EventSource::from_run_args(args)?;
    let github = GithubApiClient::new(github_api_config(args, config.current_repo.clone()))?;

    let issue = resolve_event_issue(&github, &source).await?;
    tracing::info!(
        issue = issue.number,
        title = %issue.title,
        repository = %config.current_repo.as_slug(),
        search_repository = %config.search_repo.as_slug(),
        modify = config.modify,
        "triaging issue"
    );

    let conversation = start_conversation(assistants.as_ref(), &config, &issue).await?;
    wait_for_vector_store(
        assistants.as_ref(),
        &conversation.vector_store_id,
        config.poll_interval,
    )
    .await?;

    let mut dispatcher = ToolDispatcher::new(
        assistants.clone(),
        github,
        ExternalContentFetcher::new(EXTERNAL_CONTENT_TIMEOUT_MS)?,
        config.clone(),
        issue.number,
        conversation.vector_store_id.clone(),
    );
    drive_run(
        assistants.as_ref(),
        &mut dispatcher,
        &conversation.thread_id,
        &conversation.assistant.id,
    )
    .await
}
