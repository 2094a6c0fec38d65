use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{Stream, StreamExt};

/// Largest body accepted from an external URL.
pub const EXTERNAL_CONTENT_MAX_BYTES: usize = 10 * 1024 * 1024;

const EXTERNAL_CONTENT_TYPES: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/x-log", "log"),
    ("text/html", "html"),
    ("text/markdown", "md"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypePolicyDecision {
    pub accepted: bool,
    pub extension: Option<&'static str>,
    pub reason_code: &'static str,
}

/// Matches the base media type (parameters stripped, case-insensitive) against the allow-list.
pub fn evaluate_content_type_policy(content_type: Option<&str>) -> ContentTypePolicyDecision {
    let Some(content_type) = content_type
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return ContentTypePolicyDecision {
            accepted: false,
            extension: None,
            reason_code: "deny_content_type_missing",
        };
    };
    let normalized = content_type.to_ascii_lowercase();
    let normalized_base = normalized
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or(normalized.as_str());
    match EXTERNAL_CONTENT_TYPES
        .iter()
        .find(|(media_type, _)| *media_type == normalized_base)
    {
        Some((_, extension)) => ContentTypePolicyDecision {
            accepted: true,
            extension: Some(extension),
            reason_code: "allow_content_type_listed",
        },
        None => ContentTypePolicyDecision {
            accepted: false,
            extension: None,
            reason_code: "deny_content_type_unlisted",
        },
    }
}

/// Builds `EXTERNAL_{index}_{name}` from the last URL path segment, forcing the given extension.
pub fn external_document_filename(url: &str, index: usize, extension: &str) -> String {
    let segment = reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(ToOwned::to_owned))
        })
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "content".to_string());
    let mut name: String = segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let suffix = format!(".{extension}");
    if !name.to_ascii_lowercase().ends_with(&suffix) {
        name.push_str(&suffix);
    }
    format!("EXTERNAL_{index}_{name}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDocument {
    pub content_type: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
/// Downloads assistant-requested URLs with a client that never carries tracker credentials.
pub struct ExternalContentFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ExternalContentFetcher {
    pub fn new(request_timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("issue-triage-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create external content client")?;
        Ok(Self {
            client,
            max_bytes: EXTERNAL_CONTENT_MAX_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn fetch(&self, url: &str) -> Result<ExternalDocument> {
        let parsed = reqwest::Url::parse(url).map_err(|error| anyhow!("invalid url '{url}': {error}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported url scheme '{}'", parsed.scheme());
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("request to {url} failed with status {}", status.as_u16());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let decision = evaluate_content_type_policy(content_type.as_deref());
        let (true, Some(extension)) = (decision.accepted, decision.extension) else {
            tracing::debug!(
                url,
                reason_code = decision.reason_code,
                "rejected external content"
            );
            bail!(
                "unsupported content type '{}'",
                content_type.unwrap_or_default()
            );
        };

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                tracing::debug!(
                    url,
                    declared,
                    max_bytes = self.max_bytes,
                    "external content too large"
                );
                bail!("content exceeds {} bytes", self.max_bytes);
            }
        }
        let bytes = read_capped_body(response.bytes_stream(), self.max_bytes).await?;
        Ok(ExternalDocument {
            content_type: content_type.unwrap_or_default(),
            extension,
            bytes,
        })
    }
}

/// Collects a body stream, failing as soon as it grows past `max_bytes`.
/// Chunked responses carry no length header, so the count is the real bound.
async fn read_capped_body<S, B, E>(stream: S, max_bytes: usize) -> Result<Vec<u8>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("failed to read response body")?;
        let chunk = chunk.as_ref();
        if body.len().saturating_add(chunk.len()) > max_bytes {
            bail!("content exceeds {max_bytes} bytes");
        }
        body.extend_from_slice(chunk);
    }
    Ok(body)
}
