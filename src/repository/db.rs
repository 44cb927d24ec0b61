//! Database Connection and Setup
//!
//! Manages SQLite database connection and migrations.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

/// Database state wrapper
#[derive(Clone, Default)]
pub struct DbState {
    pub conn: Arc<Mutex<Option<Connection>>>,
}

impl DbState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the open connection
    pub async fn with_conn<T, F>(&self, f: F) -> DomainResult<T>
    where
        F: FnOnce(&Connection) -> DomainResult<T> + Send,
        T: Send,
    {
        let guard = self.conn.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| DomainError::Internal("Database not initialized".to_string()))?;
        f(conn)
    }
}

/// Initialize database with path (`":memory:"` for a throwaway database)
pub async fn init_db(db_path: &Path) -> DomainResult<DbState> {
    let conn = if db_path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(db_path)?
    };

    run_migrations(&conn)?;
    log::debug!("database ready at {}", db_path.display());

    let state = DbState::new();
    *state.conn.lock().await = Some(conn);
    Ok(state)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            parent_id TEXT,
            position REAL NOT NULL DEFAULT 0,
            label TEXT NOT NULL DEFAULT '',
            created_at INTEGER,
            updated_at INTEGER
        )",
        [],
    )?;

    // Flag columns arrived after the first schema
    for column in ["starred", "excluded_from_cascade", "excluded_from_export"] {
        if !column_exists(conn, "items", column)? {
            conn.execute(
                &format!(
                    "ALTER TABLE items ADD COLUMN {} INTEGER NOT NULL DEFAULT 0",
                    column
                ),
                [],
            )
            .map_err(|e| DomainError::Storage(format!("Failed to add {}: {}", column, e)))?;
        }
    }

    // Create index for faster parent-child queries
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let state = init_db(Path::new(":memory:")).await.unwrap();
        state
            .with_conn(|conn| {
                run_migrations(conn)?;
                assert!(column_exists(conn, "items", "excluded_from_export")?);
                assert!(!column_exists(conn, "items", "collapsed")?);
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_uninitialized_state_errors() {
        let state = DbState::new();
        let result = state.with_conn(|_| Ok(())).await;
        assert!(matches!(result, Err(DomainError::Internal(_))));
    }
}
