use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use crate::issue_models::GithubIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Workflow triggers the bot knows how to handle.
pub enum IssueEventKind {
    Issues,
    WorkflowDispatch,
}

impl IssueEventKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "issues" => Ok(Self::Issues),
            "workflow_dispatch" => Ok(Self::WorkflowDispatch),
            other => bail!("unsupported event kind '{other}', expected issues or workflow_dispatch"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issues => "issues",
            Self::WorkflowDispatch => "workflow_dispatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueEventTarget {
    /// The payload carried the full issue record.
    Issue(Box<GithubIssue>),
    /// Only the number is known; the record must be fetched.
    Number(u64),
}

pub fn load_event_payload(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse event payload {}", path.display()))
}

pub fn parse_issue_event(kind: IssueEventKind, payload: &Value) -> Result<IssueEventTarget> {
    match kind {
        IssueEventKind::Issues => {
            let issue = payload
                .get("issue")
                .ok_or_else(|| anyhow!("issues event payload has no 'issue' object"))?;
            let issue: GithubIssue = serde_json::from_value(issue.clone())
                .context("failed to decode issue from event payload")?;
            Ok(IssueEventTarget::Issue(Box::new(issue)))
        }
        IssueEventKind::WorkflowDispatch => {
            let raw = payload
                .get("inputs")
                .and_then(|inputs| inputs.get("issue_number"))
                .ok_or_else(|| anyhow!("workflow_dispatch payload has no inputs.issue_number"))?;
            Ok(IssueEventTarget::Number(parse_issue_number(raw)?))
        }
    }
}

fn parse_issue_number(raw: &Value) -> Result<u64> {
    let parsed = match raw {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().trim_start_matches('#').parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(number) if number > 0 => Ok(number),
        _ => bail!("invalid issue number {raw}"),
    }
}
