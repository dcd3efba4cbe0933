//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // Using a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Replicated documents. Envelope fields are columns; payload is the
        // type-specific JSON. Tombstones keep rev/last_updated_at and drop
        // the payload so an older write cannot resurrect the id.
        "CREATE TABLE IF NOT EXISTS sync_docs (
            id TEXT PRIMARY KEY,
            rev TEXT,
            doc_type TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            last_updated_at INTEGER,
            current_version INTEGER,
            payload TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_docs_type ON sync_docs(doc_type)",
        "CREATE INDEX IF NOT EXISTS idx_sync_docs_updated ON sync_docs(last_updated_at DESC)",
        // Conflicts rejected by LWW or optimistic locking, kept for inspection
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id TEXT NOT NULL,
            existing_updated_at INTEGER,
            incoming_updated_at INTEGER,
            resolved_at INTEGER NOT NULL,
            strategy TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_doc ON sync_conflicts(doc_id)",
        // Read-only directory tables maintained by the portal's CRUD layer
        "CREATE TABLE IF NOT EXISTS assignments (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            team_id TEXT NOT NULL,
            due_date INTEGER
        )",
        "CREATE TABLE IF NOT EXISTS teams (
            id TEXT PRIMARY KEY,
            admin_id TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS team_members (
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            PRIMARY KEY (team_id, user_id)
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for statement in statements {
        conn.execute(statement, ()).await?;
    }

    conn.execute("COMMIT", ()).await?;

    Ok(())
}
