use std::time::Duration;

use anyhow::{bail, Context, Result};
use triage_ai::OpenAiConfig;
use triage_github::{GithubApiConfig, RepoRef};

use crate::cli_args::{OpenAiArgs, RunArgs};

#[derive(Debug, Clone)]
/// Settings shared by every stage of one triage run.
pub struct BotConfig {
    pub current_repo: RepoRef,
    pub search_repo: RepoRef,
    pub assistant_id: String,
    pub run_id: String,
    /// Issue mutations are only performed when this is set.
    pub modify: bool,
    pub poll_interval: Duration,
    pub max_search_results: usize,
}

impl BotConfig {
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        let current_repo = RepoRef::parse(&args.github_repository)
            .context("invalid --github-repository / GITHUB_REPOSITORY")?;
        let search_repo = match non_empty(args.search_repository.as_deref()) {
            Some(raw) => RepoRef::parse(raw)
                .context("invalid --search-repository / SEARCH_REPOSITORY")?,
            None => current_repo.clone(),
        };
        let assistant_id = args.assistant_id.trim();
        if assistant_id.is_empty() {
            bail!("--assistant-id / ASSISTANT_ID must not be empty");
        }

        let has_token = non_empty(args.github_token.as_deref()).is_some();
        if args.modify && !has_token {
            tracing::warn!("issue modification requested without a GitHub token; running read-only");
        }

        Ok(Self {
            current_repo,
            search_repo,
            assistant_id: assistant_id.to_string(),
            run_id: non_empty(Some(args.run_id.as_str()))
                .unwrap_or("#")
                .to_string(),
            modify: args.modify && has_token,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            max_search_results: args.max_search_results,
        })
    }
}

pub fn github_api_config(args: &RunArgs, repo: RepoRef) -> GithubApiConfig {
    GithubApiConfig {
        api_base: args.github_api_base.clone(),
        token: non_empty(args.github_token.as_deref()).map(ToOwned::to_owned),
        repo,
        request_timeout_ms: args.github_request_timeout_ms,
    }
}

pub fn openai_config(args: &OpenAiArgs) -> Result<OpenAiConfig> {
    let Some(api_key) = non_empty(args.openai_api_key.as_deref()) else {
        bail!("missing assistants API key: set OPENAI_API_KEY or --openai-api-key");
    };
    let mut config = OpenAiConfig::new(api_key);
    config.api_base = args.openai_base_url.clone();
    config.organization = non_empty(args.openai_organization.as_deref()).map(ToOwned::to_owned);
    config.max_retries = args.openai_max_retries;
    config.request_timeout_ms = args.openai_request_timeout_ms;
    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
