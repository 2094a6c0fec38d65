use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{
        backoff_delay, is_retryable_http_error, new_request_id, parse_retry_after_ms,
        should_retry_status,
    },
    sse::run_event_stream,
    Assistant, AssistantsClient, AssistantsError, CreateThreadRequest, FileObject, ListPage,
    RunEventStream, Thread, ToolOutput, VectorStore, VectorStoreFile, VectorStoreUpdate,
};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";
const FILE_SEARCH_RESULTS_INCLUDE: &str = "step_details.tool_calls[*].file_search.results[*].content";
const LIST_PAGE_LIMIT: &str = "100";

#[derive(Debug, Clone)]
/// Connection settings for the OpenAI assistants endpoints.
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_retries: usize,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: api_key.into(),
            organization: None,
            request_timeout_ms: 120_000,
            connect_timeout_ms: 10_000,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiAssistantsClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiAssistantsClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AssistantsError> {
        if config.api_key.trim().is_empty() {
            return Err(AssistantsError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| {
                AssistantsError::InvalidResponse(format!("invalid API key header: {e}"))
            })?,
        );
        headers.insert(
            "OpenAI-Beta",
            HeaderValue::from_static(ASSISTANTS_BETA_HEADER),
        );
        if let Some(org) = &config.organization {
            headers.insert(
                "OpenAI-Organization",
                HeaderValue::from_str(org).map_err(|e| {
                    AssistantsError::InvalidResponse(format!("invalid organization header: {e}"))
                })?,
            );
        }

        // No client-wide timeout: run streams stay open for the whole run.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms.max(1))
    }

    async fn send<F>(
        &self,
        operation: &str,
        mut build_request: F,
    ) -> Result<reqwest::Response, AssistantsError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let max_retries = self.config.max_retries;
        for attempt in 0..=max_retries {
            let response = build_request()
                .header("x-triage-request-id", new_request_id())
                .header("x-triage-retry-attempt", attempt.to_string())
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < max_retries && should_retry_status(status.as_u16()) {
                        let delay = backoff_delay(attempt, retry_after_ms);
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying assistants request"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(AssistantsError::HttpStatus {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(error) => {
                    if attempt < max_retries && is_retryable_http_error(&error) {
                        let delay = backoff_delay(attempt, None);
                        tracing::debug!(operation, attempt, %error, "retrying assistants request");
                        sleep(delay).await;
                        continue;
                    }
                    return Err(AssistantsError::Http(error));
                }
            }
        }

        Err(AssistantsError::InvalidResponse(format!(
            "{operation} retry loop terminated unexpectedly"
        )))
    }

    async fn send_json<T, F>(&self, operation: &str, build_request: F) -> Result<T, AssistantsError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send(operation, build_request).await?;
        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|error| {
            AssistantsError::InvalidResponse(format!("failed to decode {operation}: {error}"))
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AssistantsError> {
        let url = self.url(path);
        let timeout = self.request_timeout();
        self.send_json(operation, || {
            self.client.get(&url).query(query).timeout(timeout)
        })
        .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &Value,
    ) -> Result<T, AssistantsError> {
        let url = self.url(path);
        let timeout = self.request_timeout();
        self.send_json(operation, || {
            self.client.post(&url).json(body).timeout(timeout)
        })
        .await
    }

    async fn delete(&self, operation: &str, path: &str) -> Result<(), AssistantsError> {
        let url = self.url(path);
        let timeout = self.request_timeout();
        let _: Value = self
            .send_json(operation, || self.client.delete(&url).timeout(timeout))
            .await?;
        Ok(())
    }

    async fn post_stream(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<RunEventStream, AssistantsError> {
        let url = self.url(path);
        let response = self
            .send(operation, || {
                self.client
                    .post(&url)
                    .query(query)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(body)
            })
            .await?;
        Ok(run_event_stream(response))
    }
}

fn page_query(after: Option<&str>) -> Vec<(&str, &str)> {
    let mut query = vec![("limit", LIST_PAGE_LIMIT), ("order", "asc")];
    if let Some(after) = after {
        query.push(("after", after));
    }
    query
}

#[async_trait]
impl AssistantsClient for OpenAiAssistantsClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, AssistantsError> {
        self.get_json(
            "retrieve assistant",
            &format!("assistants/{assistant_id}"),
            &[],
        )
        .await
    }

    async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<FileObject, AssistantsError> {
        let url = self.url("files");
        let timeout = self.request_timeout();
        self.send_json("upload file", || {
            let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.to_string());
            let form = reqwest::multipart::Form::new()
                .text("purpose", "assistants")
                .part("file", part);
            self.client.post(&url).multipart(form).timeout(timeout)
        })
        .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), AssistantsError> {
        self.delete("delete file", &format!("files/{file_id}")).await
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<Thread, AssistantsError> {
        let body = serde_json::to_value(&request)?;
        self.post_json("create thread", "threads", &body).await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), AssistantsError> {
        self.delete("delete thread", &format!("threads/{thread_id}"))
            .await
    }

    async fn retrieve_vector_store(
        &self,
        vector_store_id: &str,
    ) -> Result<VectorStore, AssistantsError> {
        self.get_json(
            "retrieve vector store",
            &format!("vector_stores/{vector_store_id}"),
            &[],
        )
        .await
    }

    async fn update_vector_store(
        &self,
        vector_store_id: &str,
        update: VectorStoreUpdate,
    ) -> Result<VectorStore, AssistantsError> {
        let body = serde_json::to_value(&update)?;
        self.post_json(
            "update vector store",
            &format!("vector_stores/{vector_store_id}"),
            &body,
        )
        .await
    }

    async fn list_vector_stores(
        &self,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStore>, AssistantsError> {
        self.get_json("list vector stores", "vector_stores", &page_query(after))
            .await
    }

    async fn delete_vector_store(&self, vector_store_id: &str) -> Result<(), AssistantsError> {
        self.delete(
            "delete vector store",
            &format!("vector_stores/{vector_store_id}"),
        )
        .await
    }

    async fn attach_vector_store_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<VectorStoreFile, AssistantsError> {
        self.post_json(
            "attach vector store file",
            &format!("vector_stores/{vector_store_id}/files"),
            &json!({ "file_id": file_id }),
        )
        .await
    }

    async fn list_vector_store_files(
        &self,
        vector_store_id: &str,
        after: Option<&str>,
    ) -> Result<ListPage<VectorStoreFile>, AssistantsError> {
        self.get_json(
            "list vector store files",
            &format!("vector_stores/{vector_store_id}/files"),
            &page_query(after),
        )
        .await
    }

    async fn create_run_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunEventStream, AssistantsError> {
        self.post_stream(
            "create run",
            &format!("threads/{thread_id}/runs"),
            &[("include[]", FILE_SEARCH_RESULTS_INCLUDE)],
            &json!({ "assistant_id": assistant_id, "stream": true }),
        )
        .await
    }

    async fn submit_tool_outputs_stream(
        &self,
        thread_id: &str,
        run_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> Result<RunEventStream, AssistantsError> {
        self.post_stream(
            "submit tool outputs",
            &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &[],
            &json!({ "tool_outputs": tool_outputs, "stream": true }),
        )
        .await
    }
}
