use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use triage_ai::{AssistantsClient, RunToolCall, ToolOutput};
use triage_github::{github_failure_message, GithubApiClient};

use crate::bot_config::BotConfig;
use crate::external_content::{external_document_filename, ExternalContentFetcher};
use crate::issue_search::{search_related_issues, IssueSearchContext};
use crate::vector_store_wait::wait_for_vector_store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Function tools the assistant is allowed to call.
pub enum ToolName {
    SearchGithub,
    GetExternalContent,
    AddIssueLabels,
    SetIssueTitle,
    AddIssueComment,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::SearchGithub,
        ToolName::GetExternalContent,
        ToolName::AddIssueLabels,
        ToolName::SetIssueTitle,
        ToolName::AddIssueComment,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchGithub => "search_github",
            Self::GetExternalContent => "get_external_content",
            Self::AddIssueLabels => "add_issue_labels",
            Self::SetIssueTitle => "set_issue_title",
            Self::AddIssueComment => "add_issue_comment",
        }
    }

    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::AddIssueLabels | Self::SetIssueTitle | Self::AddIssueComment
        )
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ExternalContentArgs {
    url: String,
}

#[derive(Debug, Deserialize)]
struct LabelsArgs {
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TitleArgs {
    title: String,
}

#[derive(Debug, Deserialize)]
struct CommentArgs {
    body: String,
}

fn parse_arguments<T: DeserializeOwned>(tool: ToolName, raw: &str) -> Result<T, String> {
    serde_json::from_str(raw)
        .map_err(|error| format!("Failed: invalid arguments for {}: {error}", tool.as_str()))
}

/// Executes the assistant's tool calls against the tracker and the thread's vector store.
pub struct ToolDispatcher {
    assistants: Arc<dyn AssistantsClient>,
    github: GithubApiClient,
    fetcher: ExternalContentFetcher,
    config: BotConfig,
    issue_number: u64,
    vector_store_id: String,
    attached_issues: BTreeSet<u64>,
    external_documents: usize,
}

impl ToolDispatcher {
    pub fn new(
        assistants: Arc<dyn AssistantsClient>,
        github: GithubApiClient,
        fetcher: ExternalContentFetcher,
        config: BotConfig,
        issue_number: u64,
        vector_store_id: impl Into<String>,
    ) -> Self {
        Self {
            assistants,
            github,
            fetcher,
            config,
            issue_number,
            vector_store_id: vector_store_id.into(),
            attached_issues: BTreeSet::new(),
            external_documents: 0,
        }
    }

    /// Produces exactly one output per call, in call order.
    ///
    /// An unknown tool name anywhere in the batch fails before any call runs.
    pub async fn handle_tool_calls(&mut self, calls: &[RunToolCall]) -> Result<Vec<ToolOutput>> {
        let tools = calls
            .iter()
            .map(|call| {
                ToolName::parse(&call.function.name).ok_or_else(|| {
                    anyhow!(
                        "assistant requested unknown tool '{}' (call {})",
                        call.function.name,
                        call.id
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut outputs = Vec::with_capacity(calls.len());
        for (call, tool) in calls.iter().zip(tools) {
            tracing::info!(
                tool = tool.as_str(),
                call_id = %call.id,
                arguments = %call.function.arguments,
                "tool call"
            );
            let output = self.dispatch(tool, &call.function.arguments).await?;
            tracing::debug!(tool = tool.as_str(), call_id = %call.id, output = %output, "tool output");
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        Ok(outputs)
    }

    async fn dispatch(&mut self, tool: ToolName, arguments: &str) -> Result<String> {
        if tool.is_mutation() && !self.config.modify {
            tracing::info!(tool = tool.as_str(), "issue modification disabled; skipping");
            return Ok("Ok".to_string());
        }
        match tool {
            ToolName::SearchGithub => match parse_arguments::<SearchArgs>(tool, arguments) {
                Ok(args) => self.search_github(&args.query).await,
                Err(output) => Ok(output),
            },
            ToolName::GetExternalContent => {
                match parse_arguments::<ExternalContentArgs>(tool, arguments) {
                    Ok(args) => self.get_external_content(&args.url).await,
                    Err(output) => Ok(output),
                }
            }
            ToolName::AddIssueLabels => match parse_arguments::<LabelsArgs>(tool, arguments) {
                Ok(args) => Ok(mutation_output(
                    self.github.add_issue_labels(self.issue_number, &args.labels),
                )
                .await),
                Err(output) => Ok(output),
            },
            ToolName::SetIssueTitle => match parse_arguments::<TitleArgs>(tool, arguments) {
                Ok(args) => Ok(mutation_output(
                    self.github.set_issue_title(self.issue_number, &args.title),
                )
                .await),
                Err(output) => Ok(output),
            },
            ToolName::AddIssueComment => match parse_arguments::<CommentArgs>(tool, arguments) {
                Ok(args) => Ok(mutation_output(
                    self.github.create_issue_comment(self.issue_number, &args.body),
                )
                .await),
                Err(output) => Ok(output),
            },
        }
    }

    async fn search_github(&mut self, query: &str) -> Result<String> {
        let context = IssueSearchContext {
            assistants: self.assistants.as_ref(),
            github: &self.github,
            search_repo: &self.config.search_repo,
            current_issue: self.issue_number,
            vector_store_id: &self.vector_store_id,
            max_results: self.config.max_search_results,
            poll_interval: self.config.poll_interval,
        };
        search_related_issues(&context, query, &mut self.attached_issues).await
    }

    async fn get_external_content(&mut self, url: &str) -> Result<String> {
        let document = match self.fetcher.fetch(url).await {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(url, error = %format!("{error:#}"), "external content rejected");
                return Ok(format!("Failed: {error:#}"));
            }
        };

        self.external_documents += 1;
        let filename =
            external_document_filename(url, self.external_documents, document.extension);
        let file = self
            .assistants
            .upload_file(&filename, document.bytes)
            .await
            .with_context(|| format!("failed to upload {filename}"))?;
        self.assistants
            .attach_vector_store_file(&self.vector_store_id, &file.id)
            .await
            .with_context(|| format!("failed to attach {filename} to vector store"))?;
        tracing::info!(
            url,
            content_type = %document.content_type,
            filename = %filename,
            "attached external content"
        );
        wait_for_vector_store(
            self.assistants.as_ref(),
            &self.vector_store_id,
            self.config.poll_interval,
        )
        .await?;
        Ok(format!("Attached as {filename}"))
    }
}

async fn mutation_output(operation: impl Future<Output = Result<()>>) -> String {
    match operation.await {
        Ok(()) => "Ok".to_string(),
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "issue modification failed");
            format!("Failed: {}", github_failure_message(&error))
        }
    }
}
