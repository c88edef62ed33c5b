//! Epic Link field discovery
//!
//! Which custom field links a story to its epic is configured per Jira
//! install. The field catalog is consulted once per process; installs without
//! an "Epic Link" field (team-managed projects) use the structural `parent`
//! relation instead.

use super::client::JiraClient;
use super::types::FieldDef;
use crate::{FacadeError, Result};
use tokio::sync::OnceCell;
use tracing::{info, warn};

const EPIC_LINK_NAME: &str = "epic link";

/// How stories are matched to their epic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpicLinkFilter {
    /// Filter on the discovered custom field
    Direct { field_id: String },
    /// Filter on the structural parent link
    StructuralFallback,
}

impl EpicLinkFilter {
    /// JQL candidates for an epic's stories, most specific first.
    ///
    /// The caller runs them in order and keeps the first non-empty result.
    pub fn story_queries(&self, epic_key: &str) -> Vec<String> {
        let parent = format!("parent = \"{}\"", epic_key);
        match self {
            EpicLinkFilter::Direct { field_id } => vec![
                format!("{} = \"{}\"", jql_field_ref(field_id), epic_key),
                parent,
            ],
            EpicLinkFilter::StructuralFallback => vec![parent],
        }
    }
}

/// `customfield_10014` is addressed as `cf[10014]` in JQL
fn jql_field_ref(field_id: &str) -> String {
    match field_id.strip_prefix("customfield_") {
        Some(number) if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) => {
            format!("cf[{}]", number)
        }
        _ => format!("\"{}\"", field_id.replace('"', "")),
    }
}

/// Pick the Epic Link field out of a field catalog
pub fn find_epic_link(fields: &[FieldDef]) -> EpicLinkFilter {
    match fields
        .iter()
        .find(|f| f.name.trim().eq_ignore_ascii_case(EPIC_LINK_NAME))
    {
        Some(field) => EpicLinkFilter::Direct {
            field_id: field.id.clone(),
        },
        None => EpicLinkFilter::StructuralFallback,
    }
}

/// Process-wide memo of the Epic Link lookup.
///
/// The first successful lookup (either variant) is kept; failed lookups are
/// not, so the next call tries again.
#[derive(Debug, Default)]
pub struct FieldResolver {
    resolved: OnceCell<EpicLinkFilter>,
}

impl FieldResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(&self, client: &JiraClient) -> Result<EpicLinkFilter> {
        self.resolved
            .get_or_try_init(|| async {
                let fields = client.list_fields().await?;
                let filter = find_epic_link(&fields);
                match &filter {
                    EpicLinkFilter::Direct { field_id } => {
                        info!(field_id = %field_id, "Resolved Epic Link field")
                    }
                    EpicLinkFilter::StructuralFallback => {
                        warn!("'Epic Link' field not found, falling back to parent links")
                    }
                }
                Ok::<_, FacadeError>(filter)
            })
            .await
            .cloned()
    }

    /// Value cached by an earlier successful [`resolve`](Self::resolve)
    pub fn cached(&self) -> Option<&EpicLinkFilter> {
        self.resolved.get()
    }
}
