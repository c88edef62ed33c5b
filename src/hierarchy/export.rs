use crate::model::Board;
use crate::Result;
use std::path::Path;

pub const DEFAULT_OUTPUT_FILE: &str = "jira_hierarchy.json";

/// Write the hierarchy as pretty-printed JSON, replacing any previous file.
pub async fn write_hierarchy(path: &Path, boards: &[Board]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(path = %path.display(), boards = boards.len(), "Saving hierarchy");

    let json = serde_json::to_string_pretty(boards)?;
    tokio::fs::write(path, json).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn board(id: u64) -> Board {
        Board {
            id,
            name: format!("Board {}", id),
            epics: vec![],
        }
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("hierarchy.json");

        write_hierarchy(&path, &[board(1), board(2), board(3)])
            .await
            .unwrap();
        write_hierarchy(&path, &[board(9)]).await.unwrap();

        let saved: Vec<Board> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, vec![board(9)]);
    }

    #[tokio::test]
    async fn test_output_is_pretty_printed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hierarchy.json");

        write_hierarchy(&path, &[board(1)]).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  {"));
    }
}
