//! Item Batch Operations
//!
//! Flag updates across many items and row copies.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use super::item_repo::{find_item, insert_item, to_millis};
use crate::domain::{DomainError, DomainResult, Item, ItemFlag, ItemId};

/// Trait for operations applied to a set of items
#[async_trait]
pub trait ItemBatchOperations: Send + Sync {
    /// Set one flag on every listed item; returns the ids actually updated
    async fn set_flag(&self, ids: &[ItemId], flag: ItemFlag, value: bool) -> DomainResult<Vec<ItemId>>;

    /// Copy one row under the same parent at `position`
    ///
    /// The copy gets a fresh id and a " (copy)" label suffix. Children are not
    /// copied.
    async fn duplicate(&self, id: &ItemId, position: f64) -> DomainResult<Item>;
}

/// Build the copy of `original` placed at `position`
pub(crate) fn copy_of(original: &Item, position: f64) -> Item {
    let now = Utc::now();
    Item {
        id: ItemId::generate(),
        label: format!("{} (copy)", original.label),
        position,
        created_at: Some(now),
        updated_at: Some(now),
        ..original.clone()
    }
}

#[async_trait]
impl ItemBatchOperations for super::item_repo::ItemRepository {
    async fn set_flag(&self, ids: &[ItemId], flag: ItemFlag, value: bool) -> DomainResult<Vec<ItemId>> {
        self.db
            .with_conn(|conn| {
                let sql = format!(
                    "UPDATE items SET {} = ?, updated_at = ? WHERE id = ?",
                    flag.column()
                );
                let now = to_millis(Some(Utc::now()));
                let tx = conn.unchecked_transaction()?;
                let mut updated = Vec::new();
                for id in ids {
                    if tx.execute(&sql, params![value, now, id.as_str()])? > 0 {
                        updated.push(id.clone());
                    }
                }
                tx.commit()?;
                Ok(updated)
            })
            .await
    }

    async fn duplicate(&self, id: &ItemId, position: f64) -> DomainResult<Item> {
        self.db
            .with_conn(|conn| {
                let original = find_item(conn, id)?
                    .ok_or_else(|| DomainError::NotFound(format!("Item {} not found", id)))?;
                let copy = copy_of(&original, position);
                insert_item(conn, &copy)?;
                Ok(copy)
            })
            .await
    }
}
