//! Client for the hosted assistants service: threads, files, vector stores
//! and streamed runs.
mod openai;
mod retry;
mod sse;
mod types;

pub use openai::{OpenAiAssistantsClient, OpenAiConfig, DEFAULT_OPENAI_API_BASE};
pub use types::{
    api_error_message, Assistant, AssistantStreamEvent, AssistantsClient, AssistantsError,
    AttachmentTool, CreateThreadRequest, FileObject, FileSearchResources, FileSearchResult,
    FileSearchStep, FunctionCall, ListPage, MessageAttachment, MessageContent, Metadata,
    RequiredAction, Run, RunError, RunEventStream, RunStep, RunToolCall, StepDetails,
    StepToolCall, SubmitToolOutputsAction, TextContent, Thread, ThreadMessage,
    ThreadMessageInput, ToolOutput, ToolResources, VectorStore, VectorStoreFile,
    VectorStoreStatus, VectorStoreUpdate,
};
