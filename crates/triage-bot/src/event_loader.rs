use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use triage_github::{
    load_event_payload, parse_issue_event, GithubApiClient, GithubIssue, IssueEventKind,
    IssueEventTarget,
};

use crate::cli_args::RunArgs;

#[derive(Debug, Clone, PartialEq)]
/// Where the triggering issue comes from.
pub enum EventSource {
    Payload { kind: IssueEventKind, path: PathBuf },
    IssueNumber(u64),
}

impl EventSource {
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        if let Some(number) = args.issue_number {
            return Ok(Self::IssueNumber(number));
        }
        let (Some(event_name), Some(event_path)) = (&args.event_name, &args.event_path) else {
            bail!("no issue to triage: pass --issue-number or set GITHUB_EVENT_NAME and GITHUB_EVENT_PATH");
        };
        Ok(Self::Payload {
            kind: IssueEventKind::parse(event_name)?,
            path: event_path.clone(),
        })
    }
}

/// Resolves the event to a full issue record, fetching it when only a number is known.
pub async fn resolve_event_issue(
    github: &GithubApiClient,
    source: &EventSource,
) -> Result<GithubIssue> {
    let target = match source {
        EventSource::Payload { kind, path } => {
            let payload = load_event_payload(path)?;
            tracing::debug!(event = kind.as_str(), path = %path.display(), "loaded event payload");
            parse_issue_event(*kind, &payload)?
        }
        EventSource::IssueNumber(number) => IssueEventTarget::Number(*number),
    };

    match target {
        IssueEventTarget::Issue(issue) => Ok(*issue),
        IssueEventTarget::Number(number) => github
            .get_issue(number)
            .await
            .with_context(|| format!("could not fetch issue #{number}")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use httpmock::prelude::*;
    use serde_json::json;
    use triage_github::IssueEventKind;

    use super::{resolve_event_issue, EventSource};
    use crate::test_support::test_github_client;

    fn write_payload(payload: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{payload}").expect("write payload");
        file
    }

    #[tokio::test]
    async fn functional_manual_dispatch_resolves_to_fetched_issue() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/issues/77");
            then.status(200).json_body(json!({
                "number": 77,
                "title": "Variables view empty",
                "body": "After upgrading, locals are not shown.",
                "state": "open",
                "user": {"login": "erin"},
                "labels": [{"name": "bug"}],
                "comments_url": "/repos/owner/repo/issues/77/comments"
            }));
        });
        let payload = write_payload(json!({"inputs": {"issue_number": "77"}}));
        let github = test_github_client(&server);

        let issue = resolve_event_issue(
            &github,
            &EventSource::Payload {
                kind: IssueEventKind::WorkflowDispatch,
                path: payload.path().to_path_buf(),
            },
        )
        .await
        .expect("resolve");

        mock.assert();
        assert_eq!(issue.number, 77);
        assert_eq!(issue.title, "Variables view empty");
        assert_eq!(issue.user.login, "erin");
        assert_eq!(issue.state, "open");
        assert_eq!(issue.body.as_deref(), Some("After upgrading, locals are not shown."));
        assert_eq!(issue.label_names().collect::<Vec<_>>(), vec!["bug"]);
    }

    #[tokio::test]
    async fn functional_issues_event_uses_payload_without_fetching() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/issues/5");
            then.status(500);
        });
        let payload = write_payload(json!({
            "action": "opened",
            "issue": {"number": 5, "title": "t", "state": "open", "user": {"login": "f"}}
        }));
        let github = test_github_client(&server);

        let issue = resolve_event_issue(
            &github,
            &EventSource::Payload {
                kind: IssueEventKind::Issues,
                path: payload.path().to_path_buf(),
            },
        )
        .await
        .expect("resolve");

        mock.assert_calls(0);
        assert_eq!(issue.number, 5);
    }

    #[tokio::test]
    async fn regression_rejected_fetch_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/issues/9");
            then.status(404).json_body(json!({"message": "Not Found"}));
        });
        let github = test_github_client(&server);

        let error = resolve_event_issue(&github, &EventSource::IssueNumber(9))
            .await
            .expect_err("missing issue should fail");
        let rendered = format!("{error:#}");
        assert!(rendered.contains("could not fetch issue #9"), "{rendered}");
        assert!(rendered.contains("Not Found"), "{rendered}");
    }
}
