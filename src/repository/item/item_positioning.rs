//! Item Positioning Operations
//!
//! Operations for managing item positions within their parent hierarchy.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use super::item_repo::to_millis;
use crate::domain::{DomainResult, ItemId};

/// Trait for item positioning operations
#[async_trait]
pub trait ItemPositioningOperations: Send + Sync {
    /// Position that appends after the last child of a parent (used in create)
    async fn get_next_position(&self, parent_id: Option<&ItemId>) -> DomainResult<f64>;

    /// Respace children of a parent evenly (gap, 2 * gap, ...) keeping their order
    ///
    /// Returns the number of children renumbered.
    async fn renumber_children(&self, parent_id: Option<&ItemId>) -> DomainResult<usize>;
}

#[async_trait]
impl ItemPositioningOperations for super::item_repo::ItemRepository {
    async fn get_next_position(&self, parent_id: Option<&ItemId>) -> DomainResult<f64> {
        let gap = self.allocator.gap();
        self.db
            .with_conn(|conn| {
                let last: Option<f64> = conn.query_row(
                    "SELECT MAX(position) FROM items WHERE parent_id IS ?",
                    params![parent_id.map(|p| p.as_str())],
                    |row| row.get(0),
                )?;
                Ok(last.map_or(gap, |last| last + gap))
            })
            .await
    }

    async fn renumber_children(&self, parent_id: Option<&ItemId>) -> DomainResult<usize> {
        let allocator = self.allocator;
        self.db
            .with_conn(|conn| {
                // Get all items under this parent ordered by current position
                let ids = {
                    let mut stmt = conn
                        .prepare("SELECT id FROM items WHERE parent_id IS ? ORDER BY position, id")?;
                    let ids = stmt
                        .query_map(params![parent_id.map(|p| p.as_str())], |row| {
                            row.get::<_, String>(0)
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    ids
                };

                let positions = allocator.evenly_spaced(ids.len());
                let now = to_millis(Some(Utc::now()));
                let tx = conn.unchecked_transaction()?;
                for (id, position) in ids.iter().zip(positions) {
                    tx.execute(
                        "UPDATE items SET position = ?, updated_at = ? WHERE id = ?",
                        params![position, now, id],
                    )?;
                }
                tx.commit()?;
                Ok(ids.len())
            })
            .await
    }
}
