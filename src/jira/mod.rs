//! Jira Cloud integration
//!
//! - **client**: authenticated HTTP calls and status → error mapping
//! - **api**: typed operations (boards, issues, comments, attachments, roles)
//! - **fields**: one-time discovery of the Epic Link field
//! - **types**: the subset of Jira payloads the facade reads

pub mod api;
pub mod client;
pub mod fields;
pub mod types;

pub use api::validate_key;
pub use client::JiraClient;
pub use fields::{EpicLinkFilter, FieldResolver};
pub use types::{CreateIssue, FieldDef, IssueDetail, IssueRef, JiraBoard, JiraEpic, RemoteId};
