//! Typed Jira operations used by the HTTP handlers and the hierarchy walk

use super::client::{decode, JiraClient};
use super::types::{CreateIssue, FieldDef, IssueDetail, SearchPage, ValuesPage};
use crate::adf;
use crate::model::{Attachment, Comment, ProjectMember};
use crate::{FacadeError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// Fields requested for every issue whose metadata is shown
pub const METADATA_FIELDS: &str = "summary,description,comment,attachment";
/// Metadata plus the links a story's tasks are discovered through
pub const STORY_FIELDS: &str = "summary,description,comment,attachment,issuelinks";
/// Metadata plus the task's subtasks
pub const TASK_FIELDS: &str = "summary,description,comment,attachment,subtasks";
/// Fields returned by JQL searches
pub const SEARCH_FIELDS: &str = "summary,subtasks,description,comment,attachment";

pub const DEFAULT_MAX_RESULTS: u32 = 50;

const AGILE: &str = "/rest/agile/1.0";
const CORE: &str = "/rest/api/3";

/// Reject anything that is not a plain issue/project key or numeric id.
/// Keys end up inside JQL strings and URL paths.
pub fn validate_key<'a>(kind: &str, key: &'a str) -> Result<&'a str> {
    let valid = !key.is_empty()
        && key.len() <= 255
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(key)
    } else {
        Err(FacadeError::Validation(format!("Invalid {}: {:?}", kind, key)))
    }
}

fn issue_path(key: &str) -> String {
    format!("{}/issue/{}", CORE, urlencoding::encode(key))
}

impl JiraClient {
    // ============ Boards ============

    /// Raw board objects
    pub async fn list_boards(&self) -> Result<Vec<Value>> {
        let path = format!("{}/board", AGILE);
        let page: ValuesPage = self.get_as(&path, &[]).await?;
        info!(count = page.values.len(), "Listed Jira boards");
        Ok(page.values)
    }

    /// Raw epic objects on a board
    pub async fn list_board_epics(&self, board_id: u64) -> Result<Vec<Value>> {
        let path = format!("{}/board/{}/epic", AGILE, board_id);
        let page: ValuesPage = self
            .get_as(&path, &[("fields", METADATA_FIELDS.to_string())])
            .await?;
        debug!(board_id, count = page.values.len(), "Listed board epics");
        Ok(page.values)
    }

    // ============ Issues ============

    /// Raw issue JSON
    pub async fn get_issue(&self, key: &str, fields: &str) -> Result<Value> {
        let key = validate_key("issue key", key)?;
        self.get(&issue_path(key), &[("fields", fields.to_string())])
            .await
    }

    pub async fn get_issue_detail(&self, key: &str, fields: &str) -> Result<IssueDetail> {
        let value = self.get_issue(key, fields).await?;
        decode(&issue_path(key), value)
    }

    /// Search issues using JQL. Uses the search timeout.
    pub async fn search(&self, jql: &str, max_results: u32) -> Result<Vec<Value>> {
        let path = format!("{}/search/jql", CORE);
        let params = [
            ("jql", jql.to_string()),
            ("maxResults", max_results.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];

        debug!(jql = %jql, max_results, "Searching Jira issues");

        let value = self
            .request_with_timeout(Method::GET, &path, &params, None, self.timeouts().search)
            .await?;
        let page: SearchPage = decode(&path, value)?;
        info!(jql = %jql, returned = page.issues.len(), "Jira search complete");
        Ok(page.issues)
    }

    pub async fn list_project_issues(&self, project_key: &str) -> Result<Vec<Value>> {
        let project_key = validate_key("project key", project_key)?;
        let jql = format!("project = {} ORDER BY created DESC", project_key);
        self.search(&jql, DEFAULT_MAX_RESULTS).await
    }

    pub async fn create_issue(&self, request: &CreateIssue) -> Result<Value> {
        let project_key = validate_key("project key", &request.project_key)?;
        if request.summary.trim().is_empty() {
            return Err(FacadeError::Validation("summary must not be empty".to_string()));
        }

        let mut fields = json!({
            "project": { "key": project_key },
            "summary": request.summary,
            "issuetype": { "name": request.issue_type },
        });
        if let Some(ref description) = request.description {
            fields["description"] = adf::plain_text_document(description);
        }
        if let Some(ref parent) = request.parent_key {
            let parent = validate_key("parent key", parent)?;
            fields["parent"] = json!({ "key": parent });
        }

        info!(project = %project_key, issue_type = %request.issue_type, "Creating Jira issue");
        self.request(
            Method::POST,
            &format!("{}/issue", CORE),
            &[],
            Some(&json!({ "fields": fields })),
        )
        .await
    }

    pub async fn update_summary(&self, issue_id: &str, summary: &str) -> Result<Value> {
        let issue_id = validate_key("issue id", issue_id)?;
        if summary.trim().is_empty() {
            return Err(FacadeError::Validation("summary must not be empty".to_string()));
        }

        info!(issue = %issue_id, "Updating Jira issue summary");
        self.request(
            Method::PUT,
            &issue_path(issue_id),
            &[],
            Some(&json!({ "fields": { "summary": summary } })),
        )
        .await
    }

    pub async fn delete_issue(&self, issue_id: &str) -> Result<()> {
        let issue_id = validate_key("issue id", issue_id)?;
        info!(issue = %issue_id, "Deleting Jira issue");
        self.request(Method::DELETE, &issue_path(issue_id), &[], None)
            .await?;
        Ok(())
    }

    // ============ Descriptions ============

    pub async fn issue_description(&self, key: &str) -> Result<String> {
        let issue = self.get_issue(key, METADATA_FIELDS).await?;
        Ok(adf::extract_description(
            issue.get("fields").and_then(|f| f.get("description")),
        ))
    }

    pub async fn update_description(&self, key: &str, description: &str) -> Result<Value> {
        let key = validate_key("issue key", key)?;
        info!(issue = %key, "Updating Jira issue description");
        let body = json!({
            "fields": { "description": adf::plain_text_document(description) }
        });
        self.request(Method::PUT, &issue_path(key), &[], Some(&body))
            .await
    }

    // ============ Comments ============

    pub async fn list_comments(&self, key: &str) -> Result<Vec<Comment>> {
        let key = validate_key("issue key", key)?;
        let page = self
            .get(&format!("{}/comment", issue_path(key)), &[])
            .await?;
        Ok(adf::extract_comments(Some(&page)))
    }

    pub async fn add_comment(&self, key: &str, body: &str) -> Result<Value> {
        let key = validate_key("issue key", key)?;
        if body.trim().is_empty() {
            return Err(FacadeError::Validation("comment body must not be empty".to_string()));
        }

        info!(issue = %key, "Adding comment to Jira issue");
        self.request(
            Method::POST,
            &format!("{}/comment", issue_path(key)),
            &[],
            Some(&json!({ "body": adf::plain_text_document(body) })),
        )
        .await
    }

    // ============ Attachments ============

    pub async fn list_attachments(&self, key: &str) -> Result<Vec<Attachment>> {
        let issue = self.get_issue(key, METADATA_FIELDS).await?;
        Ok(adf::extract_attachments(
            issue.get("fields").and_then(|f| f.get("attachment")),
        ))
    }

    pub async fn upload_attachment(
        &self,
        key: &str,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Value> {
        let key = validate_key("issue key", key)?;

        let mut part = Part::bytes(bytes).file_name(filename.to_string());
        if let Some(content_type) = content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| FacadeError::Validation(format!("Invalid content type: {}", e)))?;
        }

        info!(issue = %key, filename = %filename, "Uploading attachment to Jira issue");
        self.upload(
            &format!("{}/attachments", issue_path(key)),
            Form::new().part("file", part),
        )
        .await
    }

    // ============ Fields & projects ============

    pub async fn list_fields(&self) -> Result<Vec<FieldDef>> {
        self.get_as(&format!("{}/field", CORE), &[]).await
    }

    /// Every actor of every role in a project
    pub async fn project_members(&self, project_key: &str) -> Result<Vec<ProjectMember>> {
        let project_key = validate_key("project key", project_key)?;
        // Keeps the order Jira lists the roles in
        let roles: Map<String, Value> = self
            .get_as(&format!("{}/project/{}/role", CORE, project_key), &[])
            .await?;

        let mut members = Vec::new();
        for (role, role_url) in roles {
            let Some(role_url) = role_url.as_str() else {
                debug!(role = %role, "Skipping role without URL");
                continue;
            };
            let role_path =
                role_path(project_key, role_url).unwrap_or_else(|| role_url.to_string());
            let role_data = self.get(&role_path, &[]).await?;
            let actors = role_data
                .get("actors")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for actor in actors {
                let user = actor.get("actorUser");
                members.push(ProjectMember {
                    role: role.clone(),
                    display_name: str_field(Some(&actor), "displayName"),
                    account_id: str_field(user, "accountId"),
                    email: str_field(user, "emailAddress"),
                });
            }
        }

        if members.is_empty() {
            return Err(FacadeError::NotFound(format!(
                "No users found for project '{}'",
                project_key
            )));
        }
        Ok(members)
    }
}

/// `.../project/{key}/role/{id}` rebuilt on the configured instance, so role
/// URLs carrying another host name for the same site still resolve.
fn role_path(project_key: &str, role_url: &str) -> Option<String> {
    let id = role_url.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}/project/{}/role/{}", CORE, project_key, id))
}

fn str_field(value: Option<&Value>, name: &str) -> Option<String> {
    value
        .and_then(|v| v.get(name))
        .and_then(Value::as_str)
        .map(str::to_string)
}
