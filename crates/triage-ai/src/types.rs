use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Assistant configuration as stored by the hosted service.
pub struct Assistant {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

impl Assistant {
    /// Compact model descriptor used for thread metadata, e.g. `gpt-4o t=0.2 top_p=1.0`.
    pub fn model_descriptor(&self) -> String {
        format!(
            "{} t={} top_p={}",
            self.model,
            format_optional_f64(self.temperature),
            format_optional_f64(self.top_p)
        )
    }
}

/// Floats keep a fractional part (`1.0`, not `1`); a missing value renders as `None`.
fn format_optional_f64(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:?}"))
        .unwrap_or_else(|| "None".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolResources {
    #[serde(default)]
    pub file_search: Option<FileSearchResources>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tool_resources: Option<ToolResources>,
}

impl Thread {
    /// First vector store attached to the thread's file-search resources.
    pub fn vector_store_id(&self) -> Option<&str> {
        self.tool_resources
            .as_ref()
            .and_then(|resources| resources.file_search.as_ref())
            .and_then(|file_search| file_search.vector_store_ids.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: String,
}

impl AttachmentTool {
    pub fn file_search() -> Self {
        Self {
            kind: "file_search".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageAttachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadMessageInput {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

impl ThreadMessageInput {
    pub fn user(content: impl Into<String>, attachments: Vec<MessageAttachment>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            attachments,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateThreadRequest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ThreadMessageInput>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates vector store indexing states.
pub enum VectorStoreStatus {
    InProgress,
    Completed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl VectorStoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: VectorStoreStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreFile {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One page of a cursor-paginated list endpoint.
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextContent {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: TextContent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    pub fn text_parts(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|part| match part {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Function tool call the run is waiting on.
pub struct RunToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitToolOutputsAction {
    #[serde(default)]
    pub tool_calls: Vec<RunToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequiredAction {
    pub submit_tool_outputs: SubmitToolOutputsAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    pub fn tool_calls(&self) -> &[RunToolCall] {
        self.required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileSearchResult {
    #[serde(default)]
    pub file_id: Option<String>,
    pub file_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileSearchStep {
    #[serde(default)]
    pub results: Vec<FileSearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepToolCall {
    FileSearch {
        #[serde(default)]
        file_search: FileSearchStep,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<StepToolCall>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStep {
    pub id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    pub step_details: StepDetails,
}

impl RunStep {
    pub fn file_search_results(&self) -> Vec<&FileSearchResult> {
        let StepDetails::ToolCalls { tool_calls } = &self.step_details else {
            return Vec::new();
        };
        tool_calls
            .iter()
            .flat_map(|call| match call {
                StepToolCall::FileSearch { file_search } => file_search.results.iter().collect(),
                StepToolCall::Other => Vec::new(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq)]
/// Server-sent events emitted by a streamed run.
pub enum AssistantStreamEvent {
    MessageCompleted(ThreadMessage),
    RunRequiresAction(Run),
    RunStepCompleted(RunStep),
    RunCompleted(Run),
    RunFailed(Run),
    Error(String),
    Done,
    Other(String),
}

#[derive(Debug, Error)]
pub enum AssistantsError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("assistants api returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl AssistantsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }
}

pub type RunEventStream = BoxStream<'static, Result<AssistantStreamEvent, AssistantsError>>;

#[async_trait]
/// Operations the bot needs from the hosted assistants service.
pub trait AssistantsClient: Send + Sync {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, AssistantsError>;

    async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<FileObject, AssistantsError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), AssistantsError>;

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread, AssistantsError>;

    async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantsError>;

    async fn retrieve_vector_store(
        &self,
        vector_store_id: &str,
    ) -> Result<VectorStore, AssistantsError>;

    async fn update_vector_store(
        &self,
        vector_store_id: &str,
        update: VectorStoreUpdate,
    ) -> Result<VectorStore, AssistantsError>;

    async fn list_vector_stores(
        &self,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStore>, AssistantsError>;

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), AssistantsError>;

    async fn attach_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, AssistantsError>;

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStoreFile>, AssistantsError>;

    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, AssistantsError>;

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream, AssistantsError>;
}

/// Best-effort extraction of `error.message` from an API error payload.
pub fn api_error_message(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let error = value.get("error").unwrap_or(&value);
    error
        .get("message")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}
