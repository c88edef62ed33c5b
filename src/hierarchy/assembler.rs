//! Boards → epics → stories → tasks → subtasks
//!
//! Each level issues one remote query per parent and fans out over the
//! children concurrently, keeping source order. A semaphore shared by the
//! whole walk caps how many remote calls are in flight at once. Every child fetch yields its
//! own `Result`; failures are logged, recorded as [`SkippedItem`]s, and the
//! child is left out. Only the top-level board listing aborts the walk.

use super::{Level, SkippedItem};
use crate::jira::api::{DEFAULT_MAX_RESULTS, METADATA_FIELDS, STORY_FIELDS, TASK_FIELDS};
use crate::jira::{
    validate_key, EpicLinkFilter, FieldResolver, IssueDetail, IssueRef, JiraBoard, JiraClient,
    JiraEpic,
};
use crate::model::{Board, Epic, IssueMetadata, Story, Subtask, Task};
use crate::{FacadeError, Result};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const NO_SUMMARY: &str = "No summary";

/// Remote calls a single walk keeps in flight
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A node together with whatever was dropped while building it
#[derive(Debug)]
struct Assembled<T> {
    node: T,
    skipped: Vec<SkippedItem>,
}

impl<T> Assembled<T> {
    fn complete(node: T) -> Self {
        Self {
            node,
            skipped: Vec::new(),
        }
    }
}

/// Split per-child results into the successes and the logged failures
fn partition<T>(level: Level, results: Vec<(String, Result<Assembled<T>>)>) -> Assembled<Vec<T>> {
    let mut nodes = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();

    for (key, result) in results {
        match result {
            Ok(assembled) => {
                nodes.push(assembled.node);
                skipped.extend(assembled.skipped);
            }
            Err(e) => {
                warn!(level = %level, key = %key, error = %e, "Skipping item");
                skipped.push(SkippedItem {
                    level,
                    key,
                    reason: e.to_string(),
                });
            }
        }
    }

    Assembled {
        node: nodes,
        skipped,
    }
}

/// Decode one raw item, naming it for the skip log if it is malformed
fn decode_item<T: DeserializeOwned>(level: Level, index: usize, raw: &Value) -> (String, Result<T>) {
    let key = raw
        .get("key")
        .or_else(|| raw.get("id"))
        .map(|v| v.to_string().trim_matches('"').to_string())
        .unwrap_or_else(|| format!("#{}", index));
    let decoded = serde_json::from_value(raw.clone())
        .map_err(|e| FacadeError::InvalidResponse(format!("malformed {}: {}", level, e)));
    (key, decoded)
}

/// Full hierarchy plus the items that had to be left out
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyReport {
    pub boards: Vec<Board>,
    pub skipped: Vec<SkippedItem>,
}

/// `/epics/{key}/stories` payload
#[derive(Debug, Clone, Serialize)]
pub struct EpicStories {
    pub epic_key: String,
    pub stories: Vec<Value>,
    #[serde(flatten)]
    pub metadata: IssueMetadata,
}

/// Walks the remote hierarchy for one request
pub struct HierarchyAssembler<'a> {
    client: &'a JiraClient,
    fields: &'a FieldResolver,
    permits: Semaphore,
}

impl<'a> HierarchyAssembler<'a> {
    pub fn new(client: &'a JiraClient, fields: &'a FieldResolver) -> Self {
        Self::with_concurrency(client, fields, DEFAULT_CONCURRENCY)
    }

    /// Zero is treated as one.
    pub fn with_concurrency(
        client: &'a JiraClient,
        fields: &'a FieldResolver,
        max_in_flight: usize,
    ) -> Self {
        Self {
            client,
            fields,
            permits: Semaphore::new(max_in_flight.max(1)),
        }
    }

    /// Run one remote call once a permit is free
    async fn limited<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FacadeError::Config(format!("request limiter closed: {}", e)))?;
        call.await
    }

    async fn issue_detail(&self, key: &str, fields: &str) -> Result<IssueDetail> {
        self.limited(self.client.get_issue_detail(key, fields)).await
    }

    async fn board_epic_list(&self, board_id: u64) -> Result<Vec<Value>> {
        self.limited(self.client.list_board_epics(board_id)).await
    }

    pub async fn build_hierarchy(&self) -> Result<Vec<Board>> {
        Ok(self.build_report().await?.boards)
    }

    /// # Errors
    /// Only when the board listing itself fails.
    pub async fn build_report(&self) -> Result<HierarchyReport> {
        let raw_boards = self.client.list_boards().await?;
        info!(count = raw_boards.len(), "Building hierarchy");

        let results = join_all(raw_boards.iter().enumerate().map(|(i, raw)| async move {
            let (key, board) = decode_item::<JiraBoard>(Level::Board, i, raw);
            let result = match board {
                Ok(board) => self.assemble_board(board).await,
                Err(e) => Err(e),
            };
            (key, result)
        }))
        .await;

        let collected = partition(Level::Board, results);
        info!(
            boards = collected.node.len(),
            skipped = collected.skipped.len(),
            "Hierarchy built"
        );
        Ok(HierarchyReport {
            boards: collected.node,
            skipped: collected.skipped,
        })
    }

    async fn assemble_board(&self, board: JiraBoard) -> Result<Assembled<Board>> {
        debug!(board_id = board.id, name = %board.name, "Processing board");
        let raw_epics = self.board_epic_list(board.id).await?;

        let results = join_all(raw_epics.iter().enumerate().map(|(i, raw)| async move {
            let (key, epic) = decode_item::<JiraEpic>(Level::Epic, i, raw);
            let result = match epic {
                Ok(epic) => self.assemble_epic(epic).await,
                Err(e) => Err(e),
            };
            (key, result)
        }))
        .await;

        let epics = partition(Level::Epic, results);
        Ok(Assembled {
            node: Board {
                id: board.id,
                name: board.name,
                epics: epics.node,
            },
            skipped: epics.skipped,
        })
    }

    async fn assemble_epic(&self, epic: JiraEpic) -> Result<Assembled<Epic>> {
        debug!(epic = %epic.key, "Processing epic");
        let detail = self.issue_detail(&epic.key, METADATA_FIELDS).await?;

        let mut skipped = Vec::new();
        let raw_stories = match self.find_stories(&epic.key).await {
            Ok(stories) => stories,
            Err(e) => {
                warn!(epic = %epic.key, error = %e, "Failed to fetch stories, keeping epic without them");
                skipped.push(SkippedItem {
                    level: Level::Story,
                    key: epic.key.clone(),
                    reason: format!("story query failed: {}", e),
                });
                Vec::new()
            }
        };

        let results = join_all(raw_stories.iter().enumerate().map(|(i, raw)| async move {
            let (key, story) = decode_item::<IssueRef>(Level::Story, i, raw);
            let result = match story {
                Ok(story) => self.assemble_story(&story).await,
                Err(e) => Err(e),
            };
            (key, result)
        }))
        .await;

        let stories = partition(Level::Story, results);
        skipped.extend(stories.skipped);

        Ok(Assembled {
            node: Epic {
                id: epic.id.to_string(),
                name: epic.display_name(),
                metadata: IssueMetadata::from_fields(&detail.fields),
                stories: stories.node,
            },
            skipped,
        })
    }

    async fn assemble_story(&self, story: &IssueRef) -> Result<Assembled<Story>> {
        let detail = self.issue_detail(&story.key, STORY_FIELDS).await?;
        let tasks = self.assemble_tasks(&detail.linked_tasks()).await;

        Ok(Assembled {
            node: Story {
                id: detail.id.to_string(),
                key: detail.key.clone(),
                summary: summary_of(detail.summary(), story),
                metadata: IssueMetadata::from_fields(&detail.fields),
                tasks: tasks.node,
            },
            skipped: tasks.skipped,
        })
    }

    async fn assemble_tasks(&self, refs: &[IssueRef]) -> Assembled<Vec<Task>> {
        let results = join_all(
            refs.iter()
                .map(|task| async move { (task.key.clone(), self.assemble_task(task).await) }),
        )
        .await;
        partition(Level::Task, results)
    }

    async fn assemble_task(&self, task: &IssueRef) -> Result<Assembled<Task>> {
        let detail = self.issue_detail(&task.key, TASK_FIELDS).await?;

        let results = join_all(detail.subtasks().into_iter().map(|sub| async move {
            let result = self.assemble_subtask(&sub).await;
            (sub.key, result)
        }))
        .await;
        let subtasks = partition(Level::Subtask, results);

        Ok(Assembled {
            node: Task {
                id: detail.id.to_string(),
                key: detail.key.clone(),
                summary: summary_of(detail.summary(), task),
                metadata: IssueMetadata::from_fields(&detail.fields),
                subtasks: subtasks.node,
            },
            skipped: subtasks.skipped,
        })
    }

    async fn assemble_subtask(&self, sub: &IssueRef) -> Result<Assembled<Subtask>> {
        let detail = self.issue_detail(&sub.key, METADATA_FIELDS).await?;
        Ok(Assembled::complete(Subtask {
            id: detail.id.to_string(),
            key: detail.key.clone(),
            summary: summary_of(detail.summary(), sub),
            metadata: IssueMetadata::from_fields(&detail.fields),
        }))
    }

    /// Run the story candidates for an epic in order; the first non-empty
    /// result wins. Fails only if every candidate query failed.
    async fn find_stories(&self, epic_key: &str) -> Result<Vec<Value>> {
        let filter = match self.fields.resolve(self.client).await {
            Ok(filter) => filter,
            Err(e) => {
                warn!(error = %e, "Epic Link lookup failed, using parent links");
                EpicLinkFilter::StructuralFallback
            }
        };

        let mut any_succeeded = false;
        let mut last_error = None;
        for jql in filter.story_queries(epic_key) {
            match self.limited(self.client.search(&jql, DEFAULT_MAX_RESULTS)).await {
                Ok(issues) if !issues.is_empty() => {
                    debug!(epic = %epic_key, jql = %jql, count = issues.len(), "Found stories");
                    return Ok(issues);
                }
                Ok(_) => any_succeeded = true,
                Err(e) => {
                    warn!(jql = %jql, error = %e, "Story query failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    // ============ Single-level views ============

    /// Epics of one board, each raw epic extended with its metadata.
    /// Epics whose detail cannot be fetched are left out.
    pub async fn board_epics(&self, board_id: u64) -> Result<Vec<Value>> {
        let raw_epics = self.board_epic_list(board_id).await?;

        let results = join_all(raw_epics.into_iter().enumerate().map(|(i, raw)| async move {
            let key = raw
                .get("key")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", i));
            let result = self.with_metadata(&key, raw).await;
            (key, result)
        }))
        .await;

        Ok(partition(Level::Epic, results).node)
    }

    async fn with_metadata(&self, key: &str, mut raw: Value) -> Result<Assembled<Value>> {
        let detail = self.issue_detail(key, METADATA_FIELDS).await?;
        let metadata = serde_json::to_value(IssueMetadata::from_fields(&detail.fields))?;

        if let (Some(target), Value::Object(extra)) = (raw.as_object_mut(), metadata) {
            target.extend(extra);
        }
        Ok(Assembled::complete(raw))
    }

    /// Stories of one epic (raw search hits) plus the epic's own metadata.
    ///
    /// # Errors
    /// `NotFound` when no candidate query returns stories.
    pub async fn epic_stories(&self, epic_key: &str) -> Result<EpicStories> {
        let epic_key = validate_key("epic key", epic_key)?;
        let stories = self.find_stories(epic_key).await?;
        if stories.is_empty() {
            let filter = self.fields.cached().cloned().unwrap_or(EpicLinkFilter::StructuralFallback);
            return Err(FacadeError::NotFound(format!(
                "No stories found for epic '{}'. Tried JQLs: {:?}",
                epic_key,
                filter.story_queries(epic_key)
            )));
        }

        let detail = self.issue_detail(epic_key, METADATA_FIELDS).await?;
        Ok(EpicStories {
            epic_key: epic_key.to_string(),
            stories,
            metadata: IssueMetadata::from_fields(&detail.fields),
        })
    }

    /// Tasks linked to one story, with their subtasks
    pub async fn story_tasks(&self, story_key: &str) -> Result<Vec<Task>> {
        let story_key = validate_key("story key", story_key)?;
        let detail = self.issue_detail(story_key, STORY_FIELDS).await?;
        Ok(self.assemble_tasks(&detail.linked_tasks()).await.node)
    }
}

fn summary_of(detail_summary: Option<&str>, reference: &IssueRef) -> String {
    detail_summary
        .or(reference.fields.summary.as_deref())
        .unwrap_or(NO_SUMMARY)
        .to_string()
}
