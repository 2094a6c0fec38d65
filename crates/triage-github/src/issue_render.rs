use crate::issue_models::{GithubIssue, GithubIssueComment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueRenderOptions {
    pub show_labels: bool,
}

impl Default for IssueRenderOptions {
    fn default() -> Self {
        Self { show_labels: true }
    }
}

/// Flattens an issue, and optionally its comments, into the markdown document
/// uploaded to the assistant.
pub fn render_issue_document(
    issue: &GithubIssue,
    comments: &[GithubIssueComment],
    options: IssueRenderOptions,
) -> String {
    let mut rendered = String::new();
    rendered.push_str(&format!("### Title: {}\n", issue.title));
    rendered.push_str(&format!("### Author: {}\n", issue.user.login));
    rendered.push_str(&format!("### State: {}\n", issue.state));
    if options.show_labels {
        let labels = issue.label_names().collect::<Vec<_>>().join(",");
        rendered.push_str(&format!("### Labels: {labels}\n"));
    }
    rendered.push_str(&format!("\n{}\n", issue.body.as_deref().unwrap_or_default()));

    for comment in comments {
        rendered.push_str(&format!("### Comment by {}\n", comment.user.login));
        rendered.push_str(&format!(
            "\n{}\n",
            comment.body.as_deref().unwrap_or_default()
        ));
    }
    rendered
}
