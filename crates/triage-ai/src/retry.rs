use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

pub const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || status >= 500
}

pub fn is_retryable_http_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Exponential backoff for zero-based `attempt`, capped at 8 seconds.
pub fn backoff_delay(attempt: usize, retry_after_ms: Option<u64>) -> Duration {
    let exponent = attempt.min(6) as u32;
    let backoff_ms = BASE_BACKOFF_MS
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(MAX_BACKOFF_MS);
    let delay_ms = match retry_after_ms {
        Some(retry_after_ms) => backoff_ms.max(retry_after_ms),
        None => backoff_ms,
    };
    Duration::from_millis(delay_ms)
}

pub fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    if let Some(raw) = headers
        .get("retry-after-ms")
        .and_then(|value| value.to_str().ok())
    {
        if let Ok(millis) = raw.trim().parse::<u64>() {
            return Some(millis);
        }
    }

    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1000));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    u64::try_from(delay_ms.max(0)).ok()
}

pub fn new_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("triage-{millis}-{count}")
}
