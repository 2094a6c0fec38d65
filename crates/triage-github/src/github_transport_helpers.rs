use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("github api {operation} failed with status {status}: {message}")]
/// Non-success response from the GitHub REST API.
pub struct GithubApiError {
    pub operation: String,
    pub status: u16,
    /// The `message` field of the error body, or the trimmed raw body.
    pub message: String,
}

/// Text suitable for handing back to the assistant: GitHub's own error message when the
/// failure came from a GitHub response, the full error chain otherwise.
pub fn github_failure_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<GithubApiError>() {
        Some(api_error) => api_error.message.clone(),
        None => format!("{error:#}"),
    }
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// GitHub error bodies carry a `message` field; fall back to the raw text.
pub fn github_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        })
        .unwrap_or_else(|| truncate_for_error(body.trim(), 800))
}
