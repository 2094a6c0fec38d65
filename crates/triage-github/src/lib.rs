//! GitHub issue models, event payload parsing, issue document rendering and
//! the REST client used by the triage bot.

pub mod github_api_client;
pub mod github_transport_helpers;
pub mod issue_event;
pub mod issue_models;
pub mod issue_render;
pub mod repo_ref;

pub use github_api_client::{GithubApiClient, GithubApiConfig, DEFAULT_GITHUB_API_BASE};
pub use github_transport_helpers::{github_failure_message, GithubApiError};
pub use issue_event::{load_event_payload, parse_issue_event, IssueEventKind, IssueEventTarget};
pub use issue_models::{
    GithubIssue, GithubIssueComment, GithubIssueLabel, GithubSearchResults, GithubUser,
};
pub use issue_render::{render_issue_document, IssueRenderOptions};
pub use repo_ref::RepoRef;
