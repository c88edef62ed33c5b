//! HTTP server for the Jira facade
//!
//! # Routes
//!
//! - `GET /boards` - Raw boards
//! - `GET /boards/{board_id}/epics` - Epics of a board with description, comments, attachments
//! - `GET /epics/{epic_key}/stories` - Stories of an epic plus the epic's metadata
//! - `GET /stories/{story_key}/tasks` - Linked tasks with their subtasks
//! - `GET /teams/project?project_key=KEY` - Members of every project role
//! - `GET /hierarchy` - Full board → subtask hierarchy
//! - `GET /hierarchy/save` - Build the hierarchy and write it to disk
//! - `GET|PUT /issues/{issue_key}/description`
//! - `GET|POST /issues/{issue_key}/comments`
//! - `GET|POST /issues/{issue_key}/attachments` (POST is multipart, field `file`)
//! - `POST /issues`, `GET /issues?project_key=KEY`
//! - `GET|PUT|DELETE /issues/{issue_key}`
//!
//! Errors are rendered as `{"detail": "..."}` with the mapped status code.
//!
//! # Example
//!
//! ```no_run
//! use jira_facade::config::JiraConfig;
//! use jira_facade::jira::JiraClient;
//! use jira_facade::server::{FacadeServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = JiraConfig::from_env().expect("Missing Jira credentials");
//!     let client = JiraClient::new(&config).expect("Failed to create client");
//!
//!     FacadeServer::new(client, ServerConfig::default())
//!         .run("127.0.0.1:8000")
//!         .await
//!         .expect("Server failed");
//! }
//! ```

use crate::hierarchy::{
    write_hierarchy, HierarchyAssembler, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_FILE,
};
use crate::jira::api::METADATA_FIELDS;
use crate::jira::{CreateIssue, FieldResolver, JiraClient};
use crate::{FacadeError, Result};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Response header carrying the number of items left out of a hierarchy
pub const SKIPPED_HEADER: &str = "x-hierarchy-skipped";

/// Server settings that are not Jira credentials
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Target of `/hierarchy/save`
    pub output_path: PathBuf,
    /// Request body size limit in bytes (attachments included)
    pub max_body_size: usize,
    /// Remote calls one hierarchy walk keeps in flight
    pub max_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            max_body_size: 10 * 1024 * 1024, // 10MB
            max_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Shared server state
struct AppState {
    client: JiraClient,
    fields: FieldResolver,
    output_path: PathBuf,
    max_concurrency: usize,
}

impl AppState {
    fn assembler(&self) -> HierarchyAssembler<'_> {
        HierarchyAssembler::with_concurrency(&self.client, &self.fields, self.max_concurrency)
    }
}

/// HTTP server exposing the facade
pub struct FacadeServer {
    state: Arc<AppState>,
    max_body_size: usize,
}

impl FacadeServer {
    pub fn new(client: JiraClient, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(AppState {
                client,
                fields: FieldResolver::new(),
                output_path: config.output_path,
                max_concurrency: config.max_concurrency,
            }),
            max_body_size: config.max_body_size,
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/boards", get(list_boards))
            .route("/boards/{board_id}/epics", get(board_epics))
            .route("/epics/{epic_key}/stories", get(epic_stories))
            .route("/stories/{story_key}/tasks", get(story_tasks))
            .route("/teams/project", get(project_members))
            .route("/hierarchy", get(hierarchy))
            .route("/hierarchy/save", get(save_hierarchy))
            .route(
                "/issues/{issue_key}/description",
                get(get_description).put(update_description),
            )
            .route(
                "/issues/{issue_key}/comments",
                get(list_comments).post(add_comment),
            )
            .route(
                "/issues/{issue_key}/attachments",
                get(list_attachments).post(add_attachment),
            )
            .route("/issues", get(list_issues).post(create_issue))
            .route(
                "/issues/{issue_key}",
                get(get_issue).put(update_issue).delete(delete_issue),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(self.max_body_size)),
            )
            .with_state(self.state.clone())
    }

    /// Run the server on the given address
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            addr = addr,
            jira = %self.state.client.base_url(),
            output = %self.state.output_path.display(),
            "Jira facade listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(FacadeError::Io)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for FacadeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectKeyQuery {
    pub project_key: String,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueRequest {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct DescriptionResponse {
    pub description: String,
}

/// Confirmation returned by `/hierarchy/save`
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub status: String,
    pub message: String,
    pub boards: usize,
    pub skipped: usize,
    pub saved_at: String,
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| FacadeError::Validation(e.body_text()))
}

fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(params)| params)
        .map_err(|e| FacadeError::Validation(e.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_boards(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    Ok(Json(state.client.list_boards().await?))
}

async fn board_epics(
    State(state): State<Arc<AppState>>,
    board_id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(board_id) = board_id.map_err(|e| FacadeError::Validation(e.body_text()))?;
    Ok(Json(state.assembler().board_epics(board_id).await?))
}

async fn epic_stories(
    State(state): State<Arc<AppState>>,
    Path(epic_key): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.assembler().epic_stories(&epic_key).await?))
}

async fn story_tasks(
    State(state): State<Arc<AppState>>,
    Path(story_key): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.assembler().story_tasks(&story_key).await?))
}

async fn project_members(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ProjectKeyQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let query = query_params(query)?;
    Ok(Json(state.client.project_members(&query.project_key).await?))
}

async fn hierarchy(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let report = state.assembler().build_report().await?;
    Ok((
        [(SKIPPED_HEADER, report.skipped.len().to_string())],
        Json(report.boards),
    ))
}

async fn save_hierarchy(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let report = state.assembler().build_report().await?;
    write_hierarchy(&state.output_path, &report.boards).await?;

    Ok(Json(SaveResponse {
        status: "success".to_string(),
        message: format!("Data saved to {}", state.output_path.display()),
        boards: report.boards.len(),
        skipped: report.skipped.len(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_description(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
) -> Result<impl IntoResponse> {
    let description = state.client.issue_description(&issue_key).await?;
    Ok(Json(DescriptionResponse { description }))
}

async fn update_description(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
    payload: std::result::Result<Json<DescriptionRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    Ok(Json(
        state
            .client
            .update_description(&issue_key, &request.description)
            .await?,
    ))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client.list_comments(&issue_key).await?))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
    payload: std::result::Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    Ok(Json(state.client.add_comment(&issue_key, &request.body).await?))
}

async fn list_attachments(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client.list_attachments(&issue_key).await?))
}

async fn add_attachment(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let mut multipart = multipart.map_err(|e| FacadeError::Validation(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FacadeError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| FacadeError::Validation(e.body_text()))?;

        let uploaded = state
            .client
            .upload_attachment(&issue_key, &filename, content_type.as_deref(), bytes.to_vec())
            .await?;
        return Ok(Json(uploaded));
    }

    Err(FacadeError::Validation(
        "Missing multipart field 'file'".to_string(),
    ))
}

async fn create_issue(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateIssue>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    Ok(Json(state.client.create_issue(&request).await?))
}

async fn list_issues(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ProjectKeyQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let query = query_params(query)?;
    Ok(Json(state.client.list_project_issues(&query.project_key).await?))
}

async fn update_issue(
    State(state): State<Arc<AppState>>,
    Path(issue_id): Path<String>,
    payload: std::result::Result<Json<UpdateIssueRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let request = json_body(payload)?;
    Ok(Json(
        state
            .client
            .update_summary(&issue_id, &request.summary)
            .await?,
    ))
}

async fn delete_issue(
    State(state): State<Arc<AppState>>,
    Path(issue_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.client.delete_issue(&issue_id).await?;
    Ok(Json(ErrorResponse {
        detail: "Issue deleted successfully".to_string(),
    }))
}

async fn get_issue(
    State(state): State<Arc<AppState>>,
    Path(issue_key): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client.get_issue(&issue_key, METADATA_FIELDS).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JiraConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    /// Server whose Jira is unreachable; only requests rejected locally succeed
    fn create_test_server() -> FacadeServer {
        let config = JiraConfig::from_vars(
            Some("dev@example.com".into()),
            Some("secret".into()),
            Some("http://127.0.0.1:1".into()),
        )
        .unwrap();
        FacadeServer::new(JiraClient::new(&config).unwrap(), ServerConfig::default())
    }

    async fn detail_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        body.detail
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_server().router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_issue_key_is_rejected_before_calling_jira() {
        let app = create_test_server().router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/issues/KAN%20OR%201%3D1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(detail_of(response).await.contains("Invalid issue key"));
    }

    #[tokio::test]
    async fn test_malformed_body_renders_detail() {
        let app = create_test_server().router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/issues")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"summary": "missing project"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(detail_of(response).await.contains("project_key"));
    }

    #[tokio::test]
    async fn test_missing_query_parameter_renders_detail() {
        let app = create_test_server().router();

        let response = app
            .oneshot(Request::builder().uri("/issues").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!detail_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_numeric_board_id_is_rejected() {
        let app = create_test_server().router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/boards/abc/epics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_jira_is_bad_gateway() {
        let app = create_test_server().router();

        let response = app
            .oneshot(Request::builder().uri("/boards").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(detail_of(response).await.starts_with("Transport error"));
    }
}
