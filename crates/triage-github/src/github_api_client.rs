use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::github_transport_helpers::{github_error_message, GithubApiError};
use crate::issue_models::{GithubIssue, GithubIssueComment, GithubSearchResults};
use crate::repo_ref::RepoRef;

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const COMMENTS_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct GithubApiConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub repo: RepoRef,
    pub request_timeout_ms: u64,
}

impl GithubApiConfig {
    pub fn new(repo: RepoRef, token: Option<String>) -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token,
            repo,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone)]
/// REST client scoped to the repository whose issue triggered the run.
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubApiClient {
    pub fn new(config: GithubApiConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("issue-triage-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(token) = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            let auth_header = format!("Bearer {token}");
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_header)
                    .context("invalid github authorization header")?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: config.repo,
        })
    }

    fn issue_url(&self, issue_number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}",
            self.api_base, self.repo.owner, self.repo.name, issue_number
        )
    }

    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.api_base, url)
        } else {
            url.to_string()
        }
    }

    pub async fn get_issue(&self, issue_number: u64) -> Result<GithubIssue> {
        let url = self.issue_url(issue_number);
        self.request_json("fetch issue", || self.http.get(&url))
            .await
    }

    pub async fn search_issues(&self, query: &str) -> Result<GithubSearchResults> {
        let url = format!("{}/search/issues", self.api_base);
        self.request_json("search issues", || {
            self.http.get(&url).query(&[("q", query)])
        })
        .await
    }

    /// Lists every comment behind an issue's `comments_url`.
    pub async fn list_comments_at(&self, comments_url: &str) -> Result<Vec<GithubIssueComment>> {
        let url = self.absolute_url(comments_url);
        let per_page = COMMENTS_PAGE_SIZE.to_string();
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<GithubIssueComment> = self
                .request_json("list issue comments", || {
                    self.http.get(&url).query(&[
                        ("per_page", per_page.as_str()),
                        ("page", page_value.as_str()),
                    ])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < COMMENTS_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub async fn add_issue_labels(&self, issue_number: u64, labels: &[String]) -> Result<()> {
        let url = format!("{}/labels", self.issue_url(issue_number));
        let payload = json!({ "labels": labels });
        let _: Value = self
            .request_json("add issue labels", || self.http.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    pub async fn set_issue_title(&self, issue_number: u64, title: &str) -> Result<()> {
        let url = self.issue_url(issue_number);
        let payload = json!({ "title": title });
        let _: Value = self
            .request_json("set issue title", || self.http.patch(&url).json(&payload))
            .await?;
        Ok(())
    }

    pub async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        let url = format!("{}/comments", self.issue_url(issue_number));
        let payload = json!({ "body": body });
        let _: Value = self
            .request_json("create issue comment", || self.http.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    /// Sends one request and decodes the JSON body. Failures are not retried; a
    /// non-success status surfaces as [`GithubApiError`].
    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> reqwest::RequestBuilder,
    {
        let response = request_builder()
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .with_context(|| format!("failed to decode github {operation}"));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), "github request rejected");
        Err(GithubApiError {
            operation: operation.to_string(),
            status: status.as_u16(),
            message: github_error_message(&body),
        }
        .into())
    }
}
