//! Item Repository - Core CRUD Operations
//!
//! SQLite-backed implementation for Item CRUD operations.
//! Specialized operations are in separate modules:
//! - item_hierarchy: Hierarchy operations (children, descendants, move, promote)
//! - item_positioning: Position management
//! - item_batch: Flag updates and duplication

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::super::db::DbState;
use super::super::traits::Repository;
use crate::domain::{DomainError, DomainResult, Item, ItemId, PositionAllocator};

pub(super) const ITEM_COLUMNS: &str = "id, parent_id, position, label, starred, excluded_from_cascade, excluded_from_export, created_at, updated_at";

/// SQLite implementation of Item repository
#[derive(Clone)]
pub struct ItemRepository {
    pub(super) db: DbState,
    pub(super) allocator: PositionAllocator,
}

impl ItemRepository {
    pub fn new(db: DbState) -> Self {
        Self {
            db,
            allocator: PositionAllocator::default(),
        }
    }

    /// Use a non-default gap for appends and renumbering
    pub fn with_allocator(mut self, allocator: PositionAllocator) -> Self {
        self.allocator = allocator;
        self
    }
}

#[async_trait]
impl Repository<Item> for ItemRepository {
    async fn create(&self, entity: &Item) -> DomainResult<Item> {
        let mut item = entity.clone();
        if item.id.as_str().is_empty() {
            item.id = ItemId::generate();
        }
        let now = Utc::now();
        item.created_at = Some(item.created_at.unwrap_or(now));
        item.updated_at = Some(now);

        self.db
            .with_conn(|conn| {
                insert_item(conn, &item)?;
                Ok(())
            })
            .await?;
        Ok(item)
    }

    async fn find_by_id(&self, id: &ItemId) -> DomainResult<Option<Item>> {
        self.db.with_conn(|conn| find_item(conn, id)).await
    }

    async fn list(&self) -> DomainResult<Vec<Item>> {
        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM items ORDER BY parent_id NULLS FIRST, position ASC, id ASC",
                    ITEM_COLUMNS
                ))?;
                let items = stmt
                    .query_map([], row_to_item)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(items)
            })
            .await
    }

    async fn update(&self, entity: &Item) -> DomainResult<Item> {
        let mut item = entity.clone();
        item.updated_at = Some(Utc::now());

        self.db
            .with_conn(|conn| {
                let changed = conn.execute(
                    "UPDATE items SET parent_id = ?, position = ?, label = ?, starred = ?, excluded_from_cascade = ?, excluded_from_export = ?, updated_at = ? WHERE id = ?",
                    params![
                        item.parent_id.as_ref().map(|p| p.as_str()),
                        item.position,
                        item.label,
                        item.starred,
                        item.excluded_from_cascade,
                        item.excluded_from_export,
                        to_millis(item.updated_at),
                        item.id.as_str(),
                    ],
                )?;
                if changed == 0 {
                    return Err(DomainError::NotFound(format!("Item {} not found", item.id)));
                }
                Ok(())
            })
            .await?;
        Ok(item)
    }

    async fn delete(&self, id: &ItemId) -> DomainResult<()> {
        self.db
            .with_conn(|conn| {
                let tx = conn.unchecked_transaction()?;

                // Manual cascade: delete all descendants first
                // Using recursive CTE to get all descendant IDs
                tx.execute(
                    "DELETE FROM items WHERE id IN (
                        WITH RECURSIVE descendants AS (
                            SELECT id FROM items WHERE parent_id = ?1
                            UNION
                            SELECT i.id FROM items i
                            JOIN descendants d ON i.parent_id = d.id
                        )
                        SELECT id FROM descendants
                    )",
                    params![id.as_str()],
                )?;

                // Delete the item itself
                let changed = tx.execute("DELETE FROM items WHERE id = ?", params![id.as_str()])?;
                if changed == 0 {
                    return Err(DomainError::NotFound(format!("Item {} not found", id)));
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }
}

pub(super) fn insert_item(conn: &Connection, item: &Item) -> DomainResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO items ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ITEM_COLUMNS
        ),
        params![
            item.id.as_str(),
            item.parent_id.as_ref().map(|p| p.as_str()),
            item.position,
            item.label,
            item.starred,
            item.excluded_from_cascade,
            item.excluded_from_export,
            to_millis(item.created_at),
            to_millis(item.updated_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DomainError::Conflict(format!("Item {} already exists", item.id))
        }
        other => other.into(),
    })?;
    Ok(())
}

pub(super) fn find_item(conn: &Connection, id: &ItemId) -> DomainResult<Option<Item>> {
    let item = conn
        .query_row(
            &format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS),
            params![id.as_str()],
            row_to_item,
        )
        .optional()?;
    Ok(item)
}

/// Convert a database row to Item
pub(super) fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId::new(row.get::<_, String>(0)?),
        parent_id: row.get::<_, Option<String>>(1)?.map(ItemId::new),
        position: row.get(2)?,
        label: row.get(3)?,
        starred: row.get(4)?,
        excluded_from_cascade: row.get(5)?,
        excluded_from_export: row.get(6)?,
        created_at: from_millis(row.get(7)?),
        updated_at: from_millis(row.get(8)?),
    })
}

pub(super) fn to_millis(t: Option<DateTime<Utc>>) -> Option<i64> {
    t.map(|t| t.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}
