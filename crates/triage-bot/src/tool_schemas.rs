use serde_json::{json, Value};

use crate::tool_dispatch::ToolName;

fn tool_description(tool: ToolName) -> &'static str {
    match tool {
        ToolName::SearchGithub => {
            "Search earlier GitHub issues. Matching issues are attached to this thread as files."
        }
        ToolName::GetExternalContent => {
            "Download a text, log, html, markdown or image URL referenced by the issue and attach it to this thread."
        }
        ToolName::AddIssueLabels => "Add labels to the issue being triaged.",
        ToolName::SetIssueTitle => "Replace the title of the issue being triaged.",
        ToolName::AddIssueComment => "Post a comment on the issue being triaged.",
    }
}

fn tool_parameters(tool: ToolName) -> Value {
    let (name, property) = match tool {
        ToolName::SearchGithub => (
            "query",
            json!({"type": "string", "description": "GitHub issue search terms"}),
        ),
        ToolName::GetExternalContent => (
            "url",
            json!({"type": "string", "description": "Absolute http(s) URL"}),
        ),
        ToolName::AddIssueLabels => (
            "labels",
            json!({"type": "array", "items": {"type": "string"}}),
        ),
        ToolName::SetIssueTitle => ("title", json!({"type": "string"})),
        ToolName::AddIssueComment => (
            "body",
            json!({"type": "string", "description": "Markdown comment body"}),
        ),
    };
    json!({
        "type": "object",
        "properties": { (name): property },
        "required": [name],
    })
}

/// Function tool definitions matching what the dispatcher accepts.
pub fn tool_definitions() -> Value {
    Value::Array(
        ToolName::ALL
            .into_iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.as_str(),
                        "description": tool_description(tool),
                        "parameters": tool_parameters(tool),
                    }
                })
            })
            .collect(),
    )
}
