//! Item Hierarchy Operations
//!
//! Operations for managing parent-child relationships between items.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use super::item_repo::{find_item, row_to_item, to_millis, ITEM_COLUMNS};
use crate::domain::{DomainError, DomainResult, Item, ItemId};

/// Trait for item hierarchy operations
#[async_trait]
pub trait ItemHierarchyOperations: Send + Sync {
    /// Children of a parent (None = root items), sorted by position then id
    async fn get_children(&self, parent_id: Option<&ItemId>) -> DomainResult<Vec<Item>>;

    /// Set parent and position of one item in a single write
    async fn move_to(
        &self,
        id: &ItemId,
        new_parent_id: Option<&ItemId>,
        position: f64,
    ) -> DomainResult<()>;

    /// Put several items under `parent_id` at the given positions in one write
    ///
    /// Either every row is updated or none is; a missing id fails the whole
    /// call with `NotFound`.
    async fn set_positions(
        &self,
        parent_id: Option<&ItemId>,
        positions: &[(ItemId, f64)],
    ) -> DomainResult<()>;

    /// All descendants of an item, breadth first
    async fn get_descendants(&self, id: &ItemId) -> DomainResult<Vec<Item>>;

    /// Delete one item and hand its children to its parent
    ///
    /// `child_positions` gives each direct child its position under the new
    /// parent; children not listed keep their current position.
    /// `sibling_positions` renumbers the deleted item's siblings in the same
    /// write.
    async fn delete_promoting(
        &self,
        id: &ItemId,
        child_positions: &[(ItemId, f64)],
        sibling_positions: &[(ItemId, f64)],
    ) -> DomainResult<()>;
}

#[async_trait]
impl ItemHierarchyOperations for super::item_repo::ItemRepository {
    async fn get_children(&self, parent_id: Option<&ItemId>) -> DomainResult<Vec<Item>> {
        self.db
            .with_conn(|conn| {
                let sql = format!(
                    "SELECT {} FROM items WHERE parent_id IS ? ORDER BY position, id",
                    ITEM_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params![parent_id.map(|p| p.as_str())], row_to_item)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(items)
            })
            .await
    }

    async fn move_to(
        &self,
        id: &ItemId,
        new_parent_id: Option<&ItemId>,
        position: f64,
    ) -> DomainResult<()> {
        self.db
            .with_conn(|conn| {
                let changed = conn.execute(
                    "UPDATE items SET parent_id = ?, position = ?, updated_at = ? WHERE id = ?",
                    params![
                        new_parent_id.map(|p| p.as_str()),
                        position,
                        to_millis(Some(Utc::now())),
                        id.as_str()
                    ],
                )?;
                if changed == 0 {
                    return Err(DomainError::NotFound(format!("Item {} not found", id)));
                }
                Ok(())
            })
            .await
    }

    async fn set_positions(
        &self,
        parent_id: Option<&ItemId>,
        positions: &[(ItemId, f64)],
    ) -> DomainResult<()> {
        self.db
            .with_conn(|conn| {
                let now = to_millis(Some(Utc::now()));
                let tx = conn.unchecked_transaction()?;
                for (id, position) in positions {
                    let changed = tx.execute(
                        "UPDATE items SET parent_id = ?, position = ?, updated_at = ? WHERE id = ?",
                        params![parent_id.map(|p| p.as_str()), position, now, id.as_str()],
                    )?;
                    if changed == 0 {
                        // Dropping the transaction rolls back earlier rows
                        return Err(DomainError::NotFound(format!("Item {} not found", id)));
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    async fn get_descendants(&self, id: &ItemId) -> DomainResult<Vec<Item>> {
        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM items WHERE parent_id = ? ORDER BY position, id",
                    ITEM_COLUMNS
                ))?;
                let mut result: Vec<Item> = Vec::new();
                let mut to_visit = vec![id.clone()];

                while let Some(current_id) = to_visit.pop() {
                    let children = stmt
                        .query_map(params![current_id.as_str()], row_to_item)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    for child in children {
                        // Stored cycles would otherwise loop forever
                        if child.id == *id || result.iter().any(|r| r.id == child.id) {
                            continue;
                        }
                        to_visit.push(child.id.clone());
                        result.push(child);
                    }
                }
                Ok(result)
            })
            .await
    }

    async fn delete_promoting(
        &self,
        id: &ItemId,
        child_positions: &[(ItemId, f64)],
        sibling_positions: &[(ItemId, f64)],
    ) -> DomainResult<()> {
        self.db
            .with_conn(|conn| {
                let item = find_item(conn, id)?
                    .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))?;
                let new_parent = item.parent_id.as_ref().map(|p| p.as_str());
                let now = to_millis(Some(Utc::now()));

                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "UPDATE items SET parent_id = ?, updated_at = ? WHERE parent_id = ?",
                    params![new_parent, now, id.as_str()],
                )?;
                for (moved_id, position) in child_positions.iter().chain(sibling_positions) {
                    tx.execute(
                        "UPDATE items SET position = ?, updated_at = ? WHERE id = ? AND parent_id IS ?",
                        params![position, now, moved_id.as_str(), new_parent],
                    )?;
                }
                tx.execute("DELETE FROM items WHERE id = ?", params![id.as_str()])?;
                tx.commit()?;
                Ok(())
            })
            .await
    }
}
