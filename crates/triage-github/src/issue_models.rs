use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GithubIssueLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Issue record as returned by the issues, search and webhook payloads.
pub struct GithubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_issue_state")]
    pub state: String,
    pub user: GithubUser,
    #[serde(default)]
    pub labels: Vec<GithubIssueLabel>,
    #[serde(default)]
    pub comments_url: Option<String>,
}

fn default_issue_state() -> String {
    "open".to_string()
}

impl GithubIssue {
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.name.as_str())
    }

    /// `{number}: {title}`, the reference used in thread and store metadata.
    pub fn reference(&self) -> String {
        format!("{}: {}", self.number, self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GithubIssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    pub user: GithubUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GithubSearchResults {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<GithubIssue>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::GithubIssue;

    #[test]
    fn unit_issue_decodes_webhook_shape_with_null_body() {
        let issue: GithubIssue = serde_json::from_value(json!({
            "id": 1001,
            "number": 42,
            "title": "Crash on launch",
            "body": null,
            "state": "open",
            "user": {"login": "alice", "id": 7},
            "labels": [{"name": "bug", "color": "d73a4a"}, {"name": "os:linux"}],
            "comments_url": "https://api.github.com/repos/o/r/issues/42/comments"
        }))
        .expect("issue");
        assert_eq!(issue.body, None);
        assert_eq!(issue.label_names().collect::<Vec<_>>(), vec!["bug", "os:linux"]);
        assert_eq!(issue.reference(), "42: Crash on launch");
    }

    #[test]
    fn unit_issue_defaults_missing_optional_fields() {
        let issue: GithubIssue = serde_json::from_value(json!({
            "number": 3,
            "title": "t",
            "user": {"login": "bob"}
        }))
        .expect("issue");
        assert_eq!(issue.state, "open");
        assert!(issue.labels.is_empty());
        assert!(issue.comments_url.is_none());
    }
}
