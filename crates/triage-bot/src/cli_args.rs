use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use triage_ai::DEFAULT_OPENAI_API_BASE;
use triage_github::DEFAULT_GITHUB_API_BASE;

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
    name = "issue-triage-bot",
    about = "Triage GitHub issues with a hosted assistant",
    version
)]
pub struct Cli {
    #[arg(
        long = "verbose",
        env = "VERBOSE",
        global = true,
        default_value_t = false,
        value_parser = FalseyValueParser::new(),
        help = "Enable debug-level logging"
    )]
    pub verbose: bool,

    #[command(flatten)]
    pub openai: OpenAiArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Handle the issue event that triggered this workflow run.
    Run(RunArgs),
    /// Delete vector stores, files and threads left behind by earlier runs.
    Cleanup(CleanupArgs),
    /// Print the function tool definitions the assistant should be configured with.
    ToolSchemas,
}

#[derive(Debug, Clone, Args)]
pub struct OpenAiArgs {
    #[arg(
        long = "openai-api-key",
        env = "OPENAI_API_KEY",
        global = true,
        hide_env_values = true,
        help = "API key for the assistants service"
    )]
    pub openai_api_key: Option<String>,

    #[arg(
        long = "openai-base-url",
        env = "OPENAI_BASE_URL",
        global = true,
        default_value = DEFAULT_OPENAI_API_BASE,
        help = "Assistants API base URL"
    )]
    pub openai_base_url: String,

    #[arg(
        long = "openai-organization",
        env = "OPENAI_ORGANIZATION",
        global = true,
        help = "Optional organization id sent with every assistants request"
    )]
    pub openai_organization: Option<String>,

    #[arg(
        long = "openai-max-retries",
        env = "OPENAI_MAX_RETRIES",
        global = true,
        default_value_t = 2,
        help = "Retries for transient assistants API failures"
    )]
    pub openai_max_retries: usize,

    #[arg(
        long = "openai-request-timeout-ms",
        env = "OPENAI_REQUEST_TIMEOUT_MS",
        global = true,
        default_value_t = 120_000,
        value_parser = parse_positive_u64,
        help = "Timeout for non-streaming assistants requests"
    )]
    pub openai_request_timeout_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token; required for issue modifications"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-repository",
        env = "GITHUB_REPOSITORY",
        help = "Repository (owner/repo) of the triggering issue"
    )]
    pub github_repository: String,

    #[arg(
        long = "search-repository",
        env = "SEARCH_REPOSITORY",
        help = "Repository searched for related issues; defaults to --github-repository"
    )]
    pub search_repository: Option<String>,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = DEFAULT_GITHUB_API_BASE,
        help = "GitHub API base URL"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-request-timeout-ms",
        env = "TRIAGE_GITHUB_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each GitHub API request"
    )]
    pub github_request_timeout_ms: u64,

    #[arg(
        long = "assistant-id",
        env = "ASSISTANT_ID",
        help = "Id of the hosted assistant that handles the conversation"
    )]
    pub assistant_id: String,

    #[arg(
        long = "modify",
        env = "MODIFY",
        default_value_t = false,
        value_parser = FalseyValueParser::new(),
        help = "Allow the assistant to label, retitle and comment on the issue"
    )]
    pub modify: bool,

    #[arg(
        long = "event-name",
        env = "GITHUB_EVENT_NAME",
        help = "Triggering event kind: issues or workflow_dispatch"
    )]
    pub event_name: Option<String>,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the triggering event's JSON payload"
    )]
    pub event_path: Option<PathBuf>,

    #[arg(
        long = "issue-number",
        value_parser = parse_positive_u64,
        help = "Triage this issue directly instead of reading an event payload"
    )]
    pub issue_number: Option<u64>,

    #[arg(
        long = "run-id",
        env = "GITHUB_RUN_ID",
        default_value = "#",
        help = "Workflow run id recorded in thread metadata"
    )]
    pub run_id: String,

    #[arg(
        long = "poll-interval-ms",
        env = "TRIAGE_POLL_INTERVAL_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Vector store status polling interval"
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long = "max-search-results",
        env = "TRIAGE_MAX_SEARCH_RESULTS",
        default_value_t = 5,
        value_parser = parse_positive_usize,
        help = "Maximum issues attached per search_github call"
    )]
    pub max_search_results: usize,
}

#[derive(Debug, Clone, Args)]
pub struct CleanupArgs {
    #[arg(
        long = "all",
        default_value_t = false,
        help = "Delete every bot-created vector store, not only expired ones"
    )]
    pub all: bool,
}
