//! Opens the assistant thread for one issue.

use anyhow::{anyhow, Context, Result};
use triage_ai::{
    Assistant, AssistantsClient, AttachmentTool, CreateThreadRequest, MessageAttachment, Metadata,
    ThreadMessageInput, VectorStoreUpdate,
};
use triage_github::{render_issue_document, GithubIssue, IssueRenderOptions};

use crate::bot_config::BotConfig;

pub const ISSUE_DOCUMENT_NAME: &str = "BUG_REPORT.md";
pub const METADATA_VALUE_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub thread_id: String,
    pub vector_store_id: String,
    pub assistant: Assistant,
}

pub(crate) fn truncate_metadata_value(value: &str) -> String {
    value.chars().take(METADATA_VALUE_MAX_CHARS).collect()
}

fn metadata_entries<'a>(entries: impl IntoIterator<Item = (&'a str, String)>) -> Metadata {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), truncate_metadata_value(&value)))
        .collect()
}

/// Creates the thread, attaches the rendered issue and tags its vector store.
pub async fn start_conversation(
    client: &dyn AssistantsClient,
    config: &BotConfig,
    issue: &GithubIssue,
) -> Result<Conversation> {
    let assistant = client
        .retrieve_assistant(&config.assistant_id)
        .await
        .with_context(|| format!("failed to retrieve assistant {}", config.assistant_id))?;

    let document = render_issue_document(issue, &[], IssueRenderOptions { show_labels: false });
    let file = client
        .upload_file(ISSUE_DOCUMENT_NAME, document.into_bytes())
        .await
        .context("failed to upload issue document")?;
    tracing::debug!(file_id = %file.id, filename = ISSUE_DOCUMENT_NAME, "uploaded issue document");

    let issue_reference = issue.reference();
    let request = CreateThreadRequest {
        metadata: metadata_entries([
            ("issue", issue_reference.clone()),
            ("run_id", config.run_id.clone()),
            ("model", assistant.model_descriptor()),
        ]),
        messages: vec![ThreadMessageInput::user(
            format!("We have a new issue report (attached as {ISSUE_DOCUMENT_NAME})"),
            vec![MessageAttachment {
                file_id: file.id,
                tools: vec![AttachmentTool::file_search()],
            }],
        )],
    };
    let thread = client
        .create_thread(request)
        .await
        .context("failed to create thread")?;
    let vector_store_id = thread
        .vector_store_id()
        .map(ToOwned::to_owned)
        .ok_or_else(|| anyhow!("thread {} has no attached vector store", thread.id))?;

    client
        .update_vector_store(
            &vector_store_id,
            VectorStoreUpdate {
                name: Some(truncate_metadata_value(&format!(
                    "issue {}: {}",
                    issue.number, issue.title
                ))),
                metadata: Some(metadata_entries([
                    ("thread_id", thread.id.clone()),
                    ("issue", issue_reference),
                    ("run_id", config.run_id.clone()),
                ])),
            },
        )
        .await
        .with_context(|| format!("failed to tag vector store {vector_store_id}"))?;

    tracing::info!(
        thread_id = %thread.id,
        vector_store_id = %vector_store_id,
        issue = issue.number,
        model = %assistant.model_descriptor(),
        "started conversation"
    );
    Ok(Conversation {
        thread_id: thread.id,
        vector_store_id,
        assistant,
    })
}

#[cfg(test)]
mod tests {
    use super::{start_conversation, truncate_metadata_value, ISSUE_DOCUMENT_NAME};
    use crate::test_support::{
        test_bot_config, test_issue, ScriptedAssistantsClient, ScriptedState,
    };

    #[tokio::test]
    async fn functional_start_conversation_uploads_report_and_tags_store() {
        let client = ScriptedAssistantsClient::default();
        let issue = test_issue(42, "Breakpoints ignored", &["bug"]);

        let conversation = start_conversation(&client, &test_bot_config(), &issue)
            .await
            .expect("start");

        assert_eq!(conversation.thread_id, "thread_1");
        assert_eq!(conversation.vector_store_id, "vs_1");

        let state = client.state();
        assert_eq!(state.uploads.len(), 1);
        let (filename, content) = &state.uploads[0];
        assert_eq!(filename, ISSUE_DOCUMENT_NAME);
        assert!(content.starts_with("### Title: Breakpoints ignored\n"));
        assert!(!content.contains("### Labels:"));

        let thread = &state.threads[0];
        assert_eq!(thread.metadata["issue"], "42: Breakpoints ignored");
        assert_eq!(thread.metadata["run_id"], "run-1");
        assert_eq!(thread.metadata["model"], "gpt-4o t=0.2 top_p=1.0");
        assert_eq!(
            thread.messages[0].content,
            "We have a new issue report (attached as BUG_REPORT.md)"
        );
        assert_eq!(thread.messages[0].attachments[0].file_id, "file_1");
        assert_eq!(thread.messages[0].attachments[0].tools[0].kind, "file_search");

        let (store_id, update) = &state.store_updates[0];
        assert_eq!(store_id, "vs_1");
        assert_eq!(update.name.as_deref(), Some("issue 42: Breakpoints ignored"));
        let metadata = update.metadata.as_ref().expect("metadata");
        assert_eq!(metadata["thread_id"], "thread_1");
        assert_eq!(metadata["issue"], "42: Breakpoints ignored");
    }

    #[tokio::test]
    async fn regression_thread_without_vector_store_is_fatal() {
        let client = ScriptedAssistantsClient::with_state(ScriptedState {
            thread_without_store: true,
            ..ScriptedState::default()
        });

        let error = start_conversation(&client, &test_bot_config(), &test_issue(1, "t", &[]))
            .await
            .expect_err("missing store");

        assert!(error.to_string().contains("no attached vector store"));
        assert!(client.state().store_updates.is_empty());
    }

    #[tokio::test]
    async fn regression_long_titles_are_truncated_in_metadata() {
        let client = ScriptedAssistantsClient::default();
        let title = "x".repeat(600);

        start_conversation(&client, &test_bot_config(), &test_issue(3, &title, &[]))
            .await
            .expect("start");

        let state = client.state();
        assert_eq!(state.threads[0].metadata["issue"].chars().count(), 512);
        assert_eq!(
            state.store_updates[0].1.name.as_deref().map(str::len),
            Some(512)
        );
    }

    #[test]
    fn unit_truncate_metadata_value_respects_char_boundaries() {
        let value = "é".repeat(600);
        assert_eq!(truncate_metadata_value(&value).chars().count(), 512);
        assert_eq!(truncate_metadata_value("short"), "short");
    }
}
