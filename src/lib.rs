//! Jira facade - a small REST service in front of Jira Cloud
//!
//! Exposes boards, epics, stories, tasks and subtasks of a Jira instance as
//! plain JSON, assembles the full work hierarchy, and offers a few write
//! operations (issues, descriptions, comments, attachments).
//!
//! # Architecture
//!
//! - **config**: Credentials from the environment and per-request timeouts
//! - **jira**: Authenticated REST client, typed payloads, Epic Link resolution
//! - **adf**: Plain-text extraction from Atlassian Document Format
//! - **model**: Normalized hierarchy nodes returned to callers
//! - **hierarchy**: Board → epic → story → task → subtask assembly and export
//! - **server**: HTTP routes and error rendering

pub mod adf;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod jira;
pub mod logging;
pub mod model;
pub mod server;

// Re-exports
pub use error::{FacadeError, Result};
