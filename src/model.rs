//! Hierarchy entities served by the API
//!
//! Read-only snapshots of remote state, rebuilt on every request. Every node
//! carries a description string plus comment and attachment arrays, never
//! absent.

use crate::adf;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A comment flattened to plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    /// Timestamp exactly as Jira sent it
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    /// Download URL
    pub content: String,
    pub created: String,
}

/// Description, comments and attachments shared by every hierarchy level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub description: String,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

impl IssueMetadata {
    /// Extract metadata from an issue's `fields` object.
    pub fn from_fields(fields: &Value) -> Self {
        Self {
            description: adf::extract_description(fields.get("description")),
            comments: adf::extract_comments(fields.get("comment")),
            attachments: adf::extract_attachments(fields.get("attachment")),
        }
    }
}

impl Default for IssueMetadata {
    fn default() -> Self {
        Self {
            description: adf::NO_DESCRIPTION.to_string(),
            comments: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: u64,
    pub name: String,
    pub epics: Vec<Epic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
    pub subtasks: Vec<Subtask>,
}

/// Leaf of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
}

/// Member of a project role, as returned by `/teams/project`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub role: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "accountId")]
    pub account_id: Option<String>,
    pub email: Option<String>,
}
