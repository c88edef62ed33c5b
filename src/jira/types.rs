//! Shapes of the Jira REST payloads the facade reads
//!
//! Only the fields the hierarchy needs are typed; everything else stays in
//! `serde_json::Value` so it can be passed through verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Ids arrive as numbers from the agile API and as strings from the core API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

/// Paged agile responses (`/board`, `/board/{id}/epic`)
#[derive(Debug, Clone, Deserialize)]
pub struct ValuesPage {
    #[serde(default)]
    pub values: Vec<Value>,
}

/// JQL search response
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraBoard {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraEpic {
    pub id: RemoteId,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl JiraEpic {
    /// Agile `name`, then `summary`, then a fixed fallback
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.summary.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Unnamed Epic")
            .to_string()
    }
}

/// Minimal reference to an issue (search hits, subtask entries, link targets)
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub id: RemoteId,
    pub key: String,
    #[serde(default)]
    pub fields: RefFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(rename = "issuetype", default)]
    pub issue_type: Option<IssueType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueType {
    pub name: String,
}

/// `GET /rest/api/3/issue/{key}` with the fields the hierarchy asks for
#[derive(Debug, Clone, Deserialize)]
pub struct IssueDetail {
    pub id: RemoteId,
    pub key: String,
    #[serde(default)]
    pub fields: Value,
}

impl IssueDetail {
    pub fn summary(&self) -> Option<&str> {
        self.fields.get("summary").and_then(Value::as_str)
    }

    /// Linked issues (either direction) whose type is `Task`
    pub fn linked_tasks(&self) -> Vec<IssueRef> {
        let links: Vec<IssueLink> = self
            .fields
            .get("issuelinks")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        links
            .into_iter()
            .filter_map(|link| {
                [link.inward_issue, link.outward_issue]
                    .into_iter()
                    .flatten()
                    .find(IssueRef::is_task)
            })
            .collect()
    }

    /// Entries of the `subtasks` field; malformed entries are dropped
    pub fn subtasks(&self) -> Vec<IssueRef> {
        self.fields
            .get("subtasks")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| serde_json::from_value(s.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl IssueRef {
    pub fn is_task(&self) -> bool {
        self.fields
            .issue_type
            .as_ref()
            .is_some_and(|t| t.name.eq_ignore_ascii_case("task"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLink {
    #[serde(rename = "inwardIssue", default)]
    pub inward_issue: Option<IssueRef>,
    #[serde(rename = "outwardIssue", default)]
    pub outward_issue: Option<IssueRef>,
}

/// Entry of the field catalog (`GET /rest/api/3/field`)
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Body of `POST /issues`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIssue {
    pub project_key: String,
    pub summary: String,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Parent issue key, required by Jira for subtasks
    #[serde(default)]
    pub parent_key: Option<String>,
}

fn default_issue_type() -> String {
    "Task".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_id_accepts_numbers_and_strings() {
        let epic: JiraEpic = serde_json::from_value(json!({ "id": 37, "key": "KAN-1" })).unwrap();
        assert_eq!(epic.id.to_string(), "37");

        let issue: IssueRef =
            serde_json::from_value(json!({ "id": "10001", "key": "KAN-2" })).unwrap();
        assert_eq!(issue.id.to_string(), "10001");
    }

    #[test]
    fn test_epic_display_name_fallbacks() {
        let named: JiraEpic =
            serde_json::from_value(json!({ "id": 1, "key": "A-1", "name": "Checkout", "summary": "s" }))
                .unwrap();
        assert_eq!(named.display_name(), "Checkout");

        let summary_only: JiraEpic =
            serde_json::from_value(json!({ "id": 1, "key": "A-1", "summary": "From summary" })).unwrap();
        assert_eq!(summary_only.display_name(), "From summary");

        let bare: JiraEpic = serde_json::from_value(json!({ "id": 1, "key": "A-1" })).unwrap();
        assert_eq!(bare.display_name(), "Unnamed Epic");
    }

    #[test]
    fn test_linked_tasks_picks_task_side_of_each_link() {
        let detail: IssueDetail = serde_json::from_value(json!({
            "id": "20",
            "key": "KAN-2",
            "fields": {
                "issuelinks": [
                    { "type": { "name": "Relates" },
                      "outwardIssue": { "id": "30", "key": "KAN-3",
                        "fields": { "summary": "Wire it", "issuetype": { "name": "Task" } } } },
                    { "type": { "name": "Blocks" },
                      "inwardIssue": { "id": "31", "key": "KAN-4",
                        "fields": { "summary": "A bug", "issuetype": { "name": "Bug" } } } },
                    { "type": { "name": "Relates" },
                      "inwardIssue": { "id": "32", "key": "KAN-5",
                        "fields": { "summary": "Another", "issuetype": { "name": "Task" } } } }
                ]
            }
        }))
        .unwrap();

        let keys: Vec<String> = detail.linked_tasks().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["KAN-3", "KAN-5"]);
    }

    #[test]
    fn test_subtasks_skip_malformed_entries() {
        let detail: IssueDetail = serde_json::from_value(json!({
            "id": "30",
            "key": "KAN-3",
            "fields": {
                "subtasks": [
                    { "id": "40", "key": "KAN-6", "fields": { "summary": "Sub" } },
                    { "summary": "no key" }
                ]
            }
        }))
        .unwrap();

        let subtasks = detail.subtasks();
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].key, "KAN-6");
    }

    #[test]
    fn test_create_issue_defaults_to_task() {
        let req: CreateIssue =
            serde_json::from_value(json!({ "project_key": "KAN", "summary": "New" })).unwrap();
        assert_eq!(req.issue_type, "Task");
        assert!(req.parent_key.is_none());
    }
}
