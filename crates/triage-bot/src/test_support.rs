//! In-memory assistants service and fixtures shared by the runtime tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use httpmock::MockServer;
use triage_ai::{
    Assistant, AssistantStreamEvent, AssistantsClient, AssistantsError, CreateThreadRequest,
    FileObject, FileSearchResources, ListPage, RunEventStream, Thread, ToolOutput, ToolResources,
    VectorStore, VectorStoreFile, VectorStoreStatus, VectorStoreUpdate,
};
use triage_github::{
    GithubApiClient, GithubApiConfig, GithubIssue, GithubIssueLabel, GithubUser, RepoRef,
};

use crate::bot_config::BotConfig;

const LIST_PAGE_SIZE: usize = 2;

#[derive(Default)]
pub(crate) struct ScriptedState {
    pub(crate) calls: Vec<String>,
    pub(crate) vector_store_statuses: VecDeque<VectorStoreStatus>,
    pub(crate) uploads: Vec<(String, String)>,
    pub(crate) attachments: Vec<(String, String)>,
    pub(crate) threads: Vec<CreateThreadRequest>,
    pub(crate) thread_without_store: bool,
    pub(crate) store_updates: Vec<(String, VectorStoreUpdate)>,
    pub(crate) run_streams: VecDeque<Vec<AssistantStreamEvent>>,
    pub(crate) submissions: Vec<(String, Vec<ToolOutput>)>,
    pub(crate) stores: Vec<VectorStore>,
    pub(crate) store_files: HashMap<String, Vec<String>>,
    pub(crate) missing_files: HashSet<String>,
    pub(crate) deleted_files: Vec<String>,
    pub(crate) deleted_stores: Vec<String>,
    pub(crate) deleted_threads: Vec<String>,
}

#[derive(Default)]
pub(crate) struct ScriptedAssistantsClient {
    state: Mutex<ScriptedState>,
}

impl ScriptedAssistantsClient {
    pub(crate) fn with_state(state: ScriptedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted state lock")
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

fn event_stream(events: Vec<AssistantStreamEvent>) -> RunEventStream {
    stream::iter(events.into_iter().map(Ok)).boxed()
}

fn page_after<T: Clone>(items: &[T], id_of: impl Fn(&T) -> &str, after: Option<&str>) -> ListPage<T> {
    let start = after
        .and_then(|after| items.iter().position(|item| id_of(item) == after))
        .map(|index| index + 1)
        .unwrap_or(0);
    let data: Vec<T> = items.iter().skip(start).take(LIST_PAGE_SIZE).cloned().collect();
    ListPage {
        has_more: start + data.len() < items.len(),
        last_id: data.last().map(|item| id_of(item).to_string()),
        data,
    }
}

#[async_trait]
impl AssistantsClient for ScriptedAssistantsClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, AssistantsError> {
        self.record(format!("retrieve_assistant:{assistant_id}"));
        Ok(Assistant {
            id: assistant_id.to_string(),
            model: "gpt-4o".to_string(),
            temperature: Some(0.2),
            top_p: Some(1.0),
        })
    }

    async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<FileObject, AssistantsError> {
        let mut state = self.state();
        state.calls.push(format!("upload_file:{filename}"));
        state
            .uploads
            .push((filename.to_string(), String::from_utf8_lossy(&bytes).to_string()));
        Ok(FileObject {
            id: format!("file_{}", state.uploads.len()),
            filename: filename.to_string(),
            bytes: Some(bytes.len() as u64),
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), AssistantsError> {
        let mut state = self.state();
        state.calls.push(format!("delete_file:{file_id}"));
        if state.missing_files.contains(file_id) {
            return Err(AssistantsError::HttpStatus {
                status: 404,
                body: "{\"error\":{\"message\":\"No such File object\"}}".to_string(),
            });
        }
        state.deleted_files.push(file_id.to_string());
        Ok(())
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread, AssistantsError> {
        let mut state = self.state();
        state.calls.push("create_thread".to_string());
        let metadata = request.metadata.clone();
        state.threads.push(request);
        let tool_resources = (!state.thread_without_store).then(|| ToolResources {
            file_search: Some(FileSearchResources {
                vector_store_ids: vec!["vs_1".to_string()],
            }),
        });
        Ok(Thread {
            id: "thread_1".to_string(),
            metadata,
            tool_resources,
        })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantsError> {
        let mut state = self.state();
        state.calls.push(format!("delete_thread:{thread_id}"));
        state.deleted_threads.push(thread_id.to_string());
        Ok(())
    }

    async fn retrieve_vector_store(
        &self,
        vector_store_id: &str,
    ) -> Result<VectorStore, AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("retrieve_vector_store:{vector_store_id}"));
        let status = state
            .vector_store_statuses
            .pop_front()
            .unwrap_or(VectorStoreStatus::Completed);
        Ok(VectorStore {
            id: vector_store_id.to_string(),
            name: None,
            status,
            metadata: Default::default(),
        })
    }

    async fn update_vector_store(
        &self,
        vector_store_id: &str,
        update: VectorStoreUpdate,
    ) -> Result<VectorStore, AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("update_vector_store:{vector_store_id}"));
        state
            .store_updates
            .push((vector_store_id.to_string(), update.clone()));
        Ok(VectorStore {
            id: vector_store_id.to_string(),
            name: update.name,
            status: VectorStoreStatus::InProgress,
            metadata: update.metadata.unwrap_or_default(),
        })
    }

    async fn list_vector_stores(
        &self,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStore>, AssistantsError> {
        let state = self.state();
        Ok(page_after(&state.stores, |store| store.id.as_str(), after))
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("delete_vector_store:{vector_store_id}"));
        state.deleted_stores.push(vector_store_id.to_string());
        Ok(())
    }

    async fn attach_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("attach_vector_store_file:{vector_store_id}:{file_id}"));
        state
            .attachments
            .push((vector_store_id.to_string(), file_id.to_string()));
        Ok(VectorStoreFile {
            id: file_id.to_string(),
            status: Some("in_progress".to_string()),
        })
    }

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStoreFile>, AssistantsError> {
        let state = self.state();
        let files: Vec<VectorStoreFile> = state
            .store_files
            .get(vector_store_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|id| VectorStoreFile { id, status: None })
            .collect();
        Ok(page_after(&files, |file| file.id.as_str(), after))
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("create_run_stream:{thread_id}:{assistant_id}"));
        let events = state.run_streams.pop_front().unwrap_or_default();
        Ok(event_stream(events))
    }

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream, AssistantsError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("submit_tool_outputs_stream:{thread_id}:{run_id}"));
        state.submissions.push((run_id.to_string(), tool_outputs));
        let events = state.run_streams.pop_front().unwrap_or_default();
        Ok(event_stream(events))
    }
}

pub(crate) fn test_github_client(server: &MockServer) -> GithubApiClient {
    GithubApiClient::new(GithubApiConfig {
        api_base: server.base_url(),
        token: Some("gh-token".to_string()),
        repo: RepoRef::parse("owner/repo").expect("repo"),
        request_timeout_ms: 5_000,
    })
    .expect("github client")
}

pub(crate) fn test_bot_config() -> BotConfig {
    BotConfig {
        current_repo: RepoRef::parse("owner/repo").expect("repo"),
        search_repo: RepoRef::parse("owner/repo").expect("repo"),
        assistant_id: "asst_1".to_string(),
        run_id: "run-1".to_string(),
        modify: true,
        poll_interval: Duration::from_millis(1),
        max_search_results: 5,
    }
}

pub(crate) fn test_issue(number: u64, title: &str, labels: &[&str]) -> GithubIssue {
    GithubIssue {
        number,
        title: title.to_string(),
        body: Some(format!("body of {number}")),
        state: "open".to_string(),
        user: GithubUser {
            login: "alice".to_string(),
        },
        labels: labels
            .iter()
            .map(|name| GithubIssueLabel {
                name: name.to_string(),
            })
            .collect(),
        comments_url: None,
    }
}
