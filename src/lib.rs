//! Prompt Tree
//!
//! Layered architecture:
//! - domain: Core entities, errors and position allocation
//! - repository: Data access abstractions and implementations (SQLite, in-memory)
//! - tree / selection: Flattened index and multi-selection over it
//! - reorder / batch: Drag reparenting and batch mutations against a store
//! - workbench: The stateful facade a UI drives

pub mod batch;
pub mod config;
pub mod domain;
pub mod reorder;
pub mod repository;
pub mod selection;
pub mod tree;
pub mod workbench;

use std::path::Path;
use std::sync::Arc;

pub use batch::{BatchDispatcher, BatchOperation, BatchReport, SelectionPolicy};
pub use config::{ConfigError, LoggingConfig, TreeConfig};
pub use domain::{DeleteStrategy, DomainError, DomainResult, Item, ItemId, PositionAllocator};
pub use reorder::{DropTarget, MoveOutcome, Placement, RejectReason, ReorderResolver};
pub use repository::{init_db, DbState, InMemoryItemStore, ItemRepository, ItemStore};
pub use selection::{ClickModifiers, Selection};
pub use tree::{TreeIndex, TreeStats};
pub use workbench::{Notice, NoticeLevel, PromptTree, TreeEvent};

/// Install the rolling file logger described by `config`
///
/// Returns `Ok(false)` when no log directory is configured.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let Some(dir) = &config.dir else {
        return Ok(false);
    };
    rolling_logger::init_logger_with(dir, &config.app_name, config.logger_config()?)?;
    let _ = rolling_logger::info(&format!(
        "{} logging to {}",
        config.app_name,
        dir.display()
    ));
    Ok(true)
}

/// Open (or create) the SQLite database at `db_path` and load the tree
pub async fn open_workbench(
    db_path: &Path,
    config: TreeConfig,
) -> DomainResult<PromptTree<ItemRepository>> {
    let db_state = init_db(db_path).await?;
    let repo = ItemRepository::new(db_state).with_allocator(config.allocator());
    let mut tree = PromptTree::new(Arc::new(repo), config);
    tree.refresh().await?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_without_dir_is_noop() {
        assert!(!init_logging(&LoggingConfig::default()).unwrap());
    }

    #[tokio::test]
    async fn test_open_workbench_on_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("prompts.db");

        let mut tree = open_workbench(&db_path, TreeConfig::default()).await.unwrap();
        assert!(tree.index().is_empty());

        let parent = tree
            .create_item("Parent", None, &Placement::End)
            .await
            .unwrap();
        let child = tree
            .create_item("Child", Some(&parent.id), &Placement::End)
            .await
            .unwrap();
        let sibling = tree
            .create_item("Sibling", None, &Placement::End)
            .await
            .unwrap();

        tree.drop_item(&sibling.id, &DropTarget::Item(parent.id.clone()))
            .await
            .unwrap();
        let labels: Vec<&str> = tree
            .index()
            .flat()
            .iter()
            .map(|f| f.item.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Parent", "Child", "Sibling"]);

        tree.toggle(&parent.id);
        tree.toggle(&child.id);
        let report = tree.run_batch(BatchOperation::Delete).await.unwrap();
        assert!(report.is_complete());
        assert!(tree.index().is_empty());
        drop(tree);

        // Reopening sees the persisted state
        let tree = open_workbench(&db_path, TreeConfig::default()).await.unwrap();
        assert!(tree.index().is_empty());
    }
}
