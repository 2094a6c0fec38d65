use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use triage_ai::AssistantsClient;
use triage_github::{
    github_failure_message, render_issue_document, GithubApiClient, GithubIssue,
    IssueRenderOptions, RepoRef,
};

use crate::vector_store_wait::wait_for_vector_store;

pub fn related_issue_filename(issue_number: u64) -> String {
    format!("ISSUE_{issue_number}.md")
}

pub fn search_query(repo: &RepoRef, query: &str) -> String {
    format!("repo:{} {}", repo.as_slug(), query.trim())
}

/// Everything a `search_github` call needs besides the query itself.
pub struct IssueSearchContext<'a> {
    pub assistants: &'a dyn AssistantsClient,
    pub github: &'a GithubApiClient,
    pub search_repo: &'a RepoRef,
    pub current_issue: u64,
    pub vector_store_id: &'a str,
    pub max_results: usize,
    pub poll_interval: Duration,
}

/// Searches for earlier issues and attaches the new matches to the thread's vector store.
///
/// Tracker failures come back as tool output text; assistants service failures are errors.
/// `attached` carries the issue numbers already attached during this run.
pub async fn search_related_issues(
    context: &IssueSearchContext<'_>,
    query: &str,
    attached: &mut BTreeSet<u64>,
) -> Result<String> {
    let full_query = search_query(context.search_repo, query);
    let results = match context.github.search_issues(&full_query).await {
        Ok(results) => results,
        Err(error) => {
            tracing::warn!(query = %full_query, error = %format!("{error:#}"), "issue search failed");
            return Ok(format!("Search failed: {}", github_failure_message(&error)));
        }
    };

    let eligible: Vec<&GithubIssue> = results
        .items
        .iter()
        .filter(|issue| issue.number < context.current_issue)
        .collect();
    tracing::info!(
        query = %full_query,
        total = results.total_count,
        eligible = eligible.len(),
        "issue search completed"
    );
    if eligible.is_empty() {
        return Ok("Search produced no results.".to_string());
    }

    let fresh: Vec<&GithubIssue> = eligible
        .iter()
        .copied()
        .filter(|issue| !attached.contains(&issue.number))
        .take(context.max_results)
        .collect();
    if fresh.is_empty() {
        let mut lines = vec![format!(
            "Found {} issues, all of which were already attached to this thread:",
            eligible.len()
        )];
        lines.extend(eligible.iter().map(|issue| attachment_line(issue.number)));
        return Ok(lines.join("\n"));
    }

    let mut lines = vec![format!(
        "Found {} issues, of which top {} were attached as files to this thread:",
        eligible.len(),
        fresh.len()
    )];
    for issue in fresh {
        let comments = match issue.comments_url.as_deref() {
            Some(url) => context.github.list_comments_at(url).await.unwrap_or_else(|error| {
                tracing::warn!(
                    issue = issue.number,
                    error = %format!("{error:#}"),
                    "could not fetch comments for related issue"
                );
                Vec::new()
            }),
            None => Vec::new(),
        };
        let document = render_issue_document(issue, &comments, IssueRenderOptions::default());
        let filename = related_issue_filename(issue.number);
        let file = context
            .assistants
            .upload_file(&filename, document.into_bytes())
            .await
            .with_context(|| format!("failed to upload {filename}"))?;
        context
            .assistants
            .attach_vector_store_file(context.vector_store_id, &file.id)
            .await
            .with_context(|| format!("failed to attach {filename} to vector store"))?;
        attached.insert(issue.number);
        tracing::debug!(issue = issue.number, file_id = %file.id, "attached related issue");
        lines.push(attachment_line(issue.number));
    }

    wait_for_vector_store(
        context.assistants,
        context.vector_store_id,
        context.poll_interval,
    )
    .await?;
    Ok(lines.join("\n"))
}

fn attachment_line(issue_number: u64) -> String {
    format!(
        "Issue number: {issue_number}, file name: {}",
        related_issue_filename(issue_number)
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;
    use triage_github::RepoRef;

    use super::{search_related_issues, IssueSearchContext};
    use crate::test_support::{test_github_client, ScriptedAssistantsClient};

    fn search_body(numbers: &[u64]) -> serde_json::Value {
        json!({
            "total_count": numbers.len(),
            "items": numbers.iter().map(|number| json!({
                "number": number,
                "title": format!("issue {number}"),
                "body": "details",
                "state": "closed",
                "user": {"login": "dev"},
                "labels": [{"name": "bug"}],
            })).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn functional_search_attaches_only_earlier_issues_once() {
        let server = MockServer::start();
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/search/issues")
                .query_param("q", "repo:owner/repo breakpoint");
            then.status(200).json_body(search_body(&[10, 42, 7, 50, 3]));
        });
        let github = test_github_client(&server);
        let assistants = ScriptedAssistantsClient::default();
        let repo = RepoRef::parse("owner/repo").expect("repo");
        let context = IssueSearchContext {
            assistants: &assistants,
            github: &github,
            search_repo: &repo,
            current_issue: 42,
            vector_store_id: "vs_1",
            max_results: 2,
            poll_interval: Duration::from_millis(1),
        };
        let mut attached = BTreeSet::new();

        let first = search_related_issues(&context, "breakpoint", &mut attached)
            .await
            .expect("first search");
        assert_eq!(
            first,
            "Found 3 issues, of which top 2 were attached as files to this thread:\n\
             Issue number: 10, file name: ISSUE_10.md\n\
             Issue number: 7, file name: ISSUE_7.md"
        );

        let second = search_related_issues(&context, "breakpoint", &mut attached)
            .await
            .expect("second search");
        assert_eq!(
            second,
            "Found 3 issues, of which top 1 were attached as files to this thread:\n\
             Issue number: 3, file name: ISSUE_3.md"
        );

        let third = search_related_issues(&context, "breakpoint", &mut attached)
            .await
            .expect("third search");
        assert!(third.starts_with("Found 3 issues, all of which were already attached"));

        search.assert_calls(3);
        assert_eq!(attached.into_iter().collect::<Vec<_>>(), vec![3, 7, 10]);
        let state = assistants.state();
        let uploaded: Vec<&str> = state.uploads.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(uploaded, vec!["ISSUE_10.md", "ISSUE_7.md", "ISSUE_3.md"]);
        assert!(state.uploads[0].1.contains("### Labels: bug\n"));
        assert_eq!(state.attachments.len(), 3);
        let polls = state
            .calls
            .iter()
            .filter(|call| call.starts_with("retrieve_vector_store"))
            .count();
        assert_eq!(polls, 2);
    }

    #[tokio::test]
    async fn functional_search_without_earlier_issues_reports_no_results() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search/issues");
            then.status(200).json_body(search_body(&[42, 99]));
        });
        let github = test_github_client(&server);
        let assistants = ScriptedAssistantsClient::default();
        let repo = RepoRef::parse("owner/repo").expect("repo");
        let context = IssueSearchContext {
            assistants: &assistants,
            github: &github,
            search_repo: &repo,
            current_issue: 42,
            vector_store_id: "vs_1",
            max_results: 5,
            poll_interval: Duration::from_millis(1),
        };

        let output = search_related_issues(&context, "crash", &mut BTreeSet::new())
            .await
            .expect("search");

        assert_eq!(output, "Search produced no results.");
        assert!(assistants.state().uploads.is_empty());
    }

    #[tokio::test]
    async fn regression_search_failure_becomes_tool_output() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search/issues");
            then.status(422).json_body(json!({"message": "Validation Failed"}));
        });
        let github = test_github_client(&server);
        let assistants = ScriptedAssistantsClient::default();
        let repo = RepoRef::parse("vadimcn/codelldb").expect("repo");
        let context = IssueSearchContext {
            assistants: &assistants,
            github: &github,
            search_repo: &repo,
            current_issue: 42,
            vector_store_id: "vs_1",
            max_results: 5,
            poll_interval: Duration::from_millis(1),
        };

        let output = search_related_issues(&context, "", &mut BTreeSet::new())
            .await
            .expect("search");

        assert_eq!(output, "Search failed: Validation Failed");
    }

    #[tokio::test]
    async fn regression_comment_fetch_failure_still_attaches_issue() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/search/issues");
            then.status(200).json_body(json!({
                "total_count": 1,
                "items": [{
                    "number": 5,
                    "title": "Old crash",
                    "state": "open",
                    "user": {"login": "dev"},
                    "comments_url": "/repos/owner/repo/issues/5/comments"
                }]
            }));
        });
        let comments = server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/issues/5/comments");
            then.status(500).json_body(json!({"message": "boom"}));
        });
        let github = test_github_client(&server);
        let assistants = ScriptedAssistantsClient::default();
        let repo = RepoRef::parse("owner/repo").expect("repo");
        let context = IssueSearchContext {
            assistants: &assistants,
            github: &github,
            search_repo: &repo,
            current_issue: 9,
            vector_store_id: "vs_1",
            max_results: 5,
            poll_interval: Duration::from_millis(1),
        };

        let output = search_related_issues(&context, "crash", &mut BTreeSet::new())
            .await
            .expect("search");

        comments.assert();
        assert!(output.contains("Issue number: 5, file name: ISSUE_5.md"));
        let state = assistants.state();
        assert!(!state.uploads[0].1.contains("### Comment by"));
    }
}
