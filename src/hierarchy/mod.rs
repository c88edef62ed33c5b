//! Hierarchy assembly and export
//!
//! - **assembler**: the four-level walk over boards, epics, stories, tasks, subtasks
//! - **export**: pretty-printed JSON snapshot on disk

mod assembler;
mod export;

pub use assembler::{EpicStories, HierarchyAssembler, HierarchyReport, DEFAULT_CONCURRENCY};
pub use export::{write_hierarchy, DEFAULT_OUTPUT_FILE};

use serde::Serialize;
use std::fmt;

/// Hierarchy level an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Board,
    Epic,
    Story,
    Task,
    Subtask,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Board => "board",
            Level::Epic => "epic",
            Level::Story => "story",
            Level::Task => "task",
            Level::Subtask => "subtask",
        };
        f.write_str(name)
    }
}

/// An item left out of the hierarchy because fetching it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub level: Level,
    pub key: String,
    pub reason: String,
}
