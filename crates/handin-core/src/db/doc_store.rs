//! Document store adapter
//!
//! The narrow persistence interface the sync engine consumes: get by id,
//! batched get, upsert, tombstone, and one atomic conditional write
//! (`push_version`) used for optimistic locking on submission documents.
//! The compare-and-swap lives in the store, not in application code, so
//! concurrent appends cannot interleave between a read and a write.

use std::collections::HashMap;

use libsql::{params, Connection, Row};
use serde_json::Value;

use crate::error::Result;
use crate::models::{StoredDocument, SubmissionVersion, SyncConflict};

/// Trait for replicated-document storage operations (async)
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Get a document by id, tombstones included
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// Batched lookup for a whole sync batch
    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, StoredDocument>>;

    /// Insert or replace a document
    async fn put(&self, doc: &StoredDocument) -> Result<()>;

    /// Insert a document only if the id is not yet present; returns false
    /// when it already exists
    async fn insert_new(&self, doc: &StoredDocument) -> Result<bool>;

    /// Mark a document deleted, keeping its envelope so the id cannot be
    /// resurrected by an older write
    async fn tombstone(&self, id: &str, rev: &str, doc_type: Option<&str>, now: i64)
        -> Result<()>;

    /// Append a version entry to a submission document iff its
    /// `current_version` still equals `expected_current_version`.
    ///
    /// Single conditional UPDATE: payload append, version bump, revision and
    /// timestamp stamp all commit together or not at all. Returns false on
    /// mismatch (or unknown/tombstoned id) without touching the row.
    async fn push_version(
        &self,
        id: &str,
        entry: &SubmissionVersion,
        expected_current_version: i64,
        new_rev: &str,
        now: i64,
    ) -> Result<bool>;

    /// Record a write rejected by LWW or optimistic locking
    async fn record_conflict(
        &self,
        doc_id: &str,
        existing_updated_at: Option<i64>,
        incoming_updated_at: Option<i64>,
        strategy: &str,
        now: i64,
    ) -> Result<()>;

    /// List recorded conflicts for a document, newest first
    async fn list_conflicts(&self, doc_id: &str) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `DocumentStore`
pub struct LibSqlDocumentStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDocumentStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_doc(row: &Row) -> Result<StoredDocument> {
        let payload: Option<String> = row.get(6)?;
        let payload = payload
            .map(|raw| serde_json::from_str::<Value>(&raw))
            .transpose()?;
        Ok(StoredDocument {
            id: row.get(0)?,
            rev: row.get(1)?,
            doc_type: row.get(2)?,
            deleted: row.get::<i32>(3)? != 0,
            last_updated_at: row.get(4)?,
            current_version: row.get(5)?,
            payload,
        })
    }
}

const SELECT_DOC: &str = "SELECT id, rev, doc_type, deleted, last_updated_at, current_version, payload
     FROM sync_docs";

impl DocumentStore for LibSqlDocumentStore<'_> {
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_DOC} WHERE id = ?"), params![id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_doc(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_many(&self, ids: &[String]) -> Result<HashMap<String, StoredDocument>> {
        let mut found = HashMap::new();
        if ids.is_empty() {
            return Ok(found);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{SELECT_DOC} WHERE id IN ({placeholders})");
        let bound: Vec<libsql::Value> = ids
            .iter()
            .map(|id| libsql::Value::Text(id.clone()))
            .collect();
        let mut rows = self.conn.query(&sql, bound).await?;

        while let Some(row) = rows.next().await? {
            let doc = Self::parse_doc(&row)?;
            found.insert(doc.id.clone(), doc);
        }

        Ok(found)
    }

    async fn put(&self, doc: &StoredDocument) -> Result<()> {
        let payload = doc
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn
            .execute(
                "INSERT INTO sync_docs (id, rev, doc_type, deleted, last_updated_at, current_version, payload)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     rev = excluded.rev,
                     doc_type = excluded.doc_type,
                     deleted = excluded.deleted,
                     last_updated_at = excluded.last_updated_at,
                     current_version = excluded.current_version,
                     payload = excluded.payload",
                params![
                    doc.id.as_str(),
                    doc.rev.clone(),
                    doc.doc_type.clone(),
                    i32::from(doc.deleted),
                    doc.last_updated_at,
                    doc.current_version,
                    payload
                ],
            )
            .await?;

        Ok(())
    }

    async fn insert_new(&self, doc: &StoredDocument) -> Result<bool> {
        let payload = doc
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let rows = self
            .conn
            .execute(
                "INSERT INTO sync_docs (id, rev, doc_type, deleted, last_updated_at, current_version, payload)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    doc.id.as_str(),
                    doc.rev.clone(),
                    doc.doc_type.clone(),
                    i32::from(doc.deleted),
                    doc.last_updated_at,
                    doc.current_version,
                    payload
                ],
            )
            .await?;

        Ok(rows > 0)
    }

    async fn tombstone(
        &self,
        id: &str,
        rev: &str,
        doc_type: Option<&str>,
        now: i64,
    ) -> Result<()> {
        // Upsert rather than update: deleting a document the server never
        // had still leaves a tombstone, matching replication semantics.
        self.conn
            .execute(
                "INSERT INTO sync_docs (id, rev, doc_type, deleted, last_updated_at, current_version, payload)
                 VALUES (?, ?, ?, 1, ?, NULL, NULL)
                 ON CONFLICT(id) DO UPDATE SET
                     rev = excluded.rev,
                     deleted = 1,
                     last_updated_at = excluded.last_updated_at,
                     current_version = NULL,
                     payload = NULL",
                params![id, rev, doc_type.map(str::to_string), now],
            )
            .await?;

        Ok(())
    }

    async fn push_version(
        &self,
        id: &str,
        entry: &SubmissionVersion,
        expected_current_version: i64,
        new_rev: &str,
        now: i64,
    ) -> Result<bool> {
        let entry_json = serde_json::to_string(entry)?;

        // The WHERE clause is the optimistic lock: zero rows changed means
        // the document moved on (or is gone) and nothing was mutated.
        let rows = self
            .conn
            .execute(
                "UPDATE sync_docs
                 SET payload = json_insert(payload, '$.versions[#]', json(?1)),
                     current_version = ?2,
                     rev = ?3,
                     last_updated_at = ?4
                 WHERE id = ?5 AND current_version = ?6 AND deleted = 0",
                params![
                    entry_json,
                    entry.version,
                    new_rev,
                    now,
                    id,
                    expected_current_version
                ],
            )
            .await?;

        Ok(rows > 0)
    }

    async fn record_conflict(
        &self,
        doc_id: &str,
        existing_updated_at: Option<i64>,
        incoming_updated_at: Option<i64>,
        strategy: &str,
        now: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (doc_id, existing_updated_at, incoming_updated_at, resolved_at, strategy)
                 VALUES (?, ?, ?, ?, ?)",
                params![doc_id, existing_updated_at, incoming_updated_at, now, strategy],
            )
            .await?;

        Ok(())
    }

    async fn list_conflicts(&self, doc_id: &str) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, doc_id, existing_updated_at, incoming_updated_at, resolved_at, strategy
                 FROM sync_conflicts WHERE doc_id = ? ORDER BY resolved_at DESC, id DESC",
                params![doc_id],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                doc_id: row.get(1)?,
                existing_updated_at: row.get(2)?,
                incoming_updated_at: row.get(3)?,
                resolved_at: row.get(4)?,
                strategy: row.get(5)?,
            });
        }

        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::db::Database;

    fn doc(id: &str) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            rev: Some("1-aaaa".to_string()),
            doc_type: Some("bookmark".to_string()),
            deleted: false,
            last_updated_at: Some(1000),
            current_version: None,
            payload: Some(json!({"url": "https://example.com"})),
        }
    }

    fn submission_doc(id: &str) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            rev: Some("1-aaaa".to_string()),
            doc_type: Some("submission".to_string()),
            deleted: false,
            last_updated_at: Some(1000),
            current_version: Some(1),
            payload: Some(json!({
                "assignment_id": "a1",
                "student_id": "s1",
                "team_id": "t1",
                "versions": [
                    {"version": 1, "file_url": "https://files/v1.pdf", "submitted_at": 500}
                ],
            })),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.put(&doc("doc-1")).await.unwrap();
        let fetched = store.get("doc-1").await.unwrap().unwrap();
        assert_eq!(fetched, doc("doc-1"));

        assert!(store.get("doc-2").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_many() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.put(&doc("doc-1")).await.unwrap();
        store.put(&doc("doc-2")).await.unwrap();

        let ids = vec![
            "doc-1".to_string(),
            "doc-2".to_string(),
            "doc-3".to_string(),
        ];
        let found = store.get_many(&ids).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("doc-1"));
        assert!(found.contains_key("doc-2"));

        assert!(store.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_new_guards_existing_id() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        assert!(store.insert_new(&doc("doc-1")).await.unwrap());
        assert!(!store.insert_new(&doc("doc-1")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tombstone_keeps_envelope() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.put(&doc("doc-1")).await.unwrap();
        store
            .tombstone("doc-1", "2-bbbb", Some("bookmark"), 2000)
            .await
            .unwrap();

        let fetched = store.get("doc-1").await.unwrap().unwrap();
        assert!(fetched.deleted);
        assert_eq!(fetched.rev.as_deref(), Some("2-bbbb"));
        assert_eq!(fetched.last_updated_at, Some(2000));
        assert!(fetched.payload.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tombstone_for_unknown_id() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.tombstone("ghost", "1-cccc", None, 3000).await.unwrap();
        let fetched = store.get("ghost").await.unwrap().unwrap();
        assert!(fetched.deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_version_appends_atomically() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.put(&submission_doc("sub_a1_s1")).await.unwrap();

        let entry = SubmissionVersion {
            version: 2,
            file_url: "https://files/v2.pdf".to_string(),
            submitted_at: 2000,
            content_hash: None,
            notes: None,
        };
        let applied = store
            .push_version("sub_a1_s1", &entry, 1, "2-bbbb", 2000)
            .await
            .unwrap();
        assert!(applied);

        let fetched = store.get("sub_a1_s1").await.unwrap().unwrap();
        assert_eq!(fetched.current_version, Some(2));
        assert_eq!(fetched.rev.as_deref(), Some("2-bbbb"));
        let versions = fetched.payload.unwrap()["versions"].clone();
        assert_eq!(versions.as_array().unwrap().len(), 2);
        assert_eq!(versions[1]["version"], json!(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_version_rejects_stale_expectation() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store.put(&submission_doc("sub_a1_s1")).await.unwrap();

        let entry = SubmissionVersion {
            version: 1,
            file_url: "https://files/other.pdf".to_string(),
            submitted_at: 2000,
            content_hash: None,
            notes: None,
        };
        // Expectation does not match the stored current_version of 1
        let applied = store
            .push_version("sub_a1_s1", &entry, 0, "2-bbbb", 2000)
            .await
            .unwrap();
        assert!(!applied);

        // No partial mutation
        let fetched = store.get("sub_a1_s1").await.unwrap().unwrap();
        assert_eq!(fetched.current_version, Some(1));
        assert_eq!(fetched.rev.as_deref(), Some("1-aaaa"));
        let versions = fetched.payload.unwrap()["versions"].clone();
        assert_eq!(versions.as_array().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_record_and_list_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());

        store
            .record_conflict("doc-1", Some(2000), Some(1000), "last_write_wins", 3000)
            .await
            .unwrap();

        let conflicts = store.list_conflicts("doc-1").await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].doc_id, "doc-1");
        assert_eq!(conflicts[0].existing_updated_at, Some(2000));
        assert_eq!(conflicts[0].incoming_updated_at, Some(1000));
        assert_eq!(conflicts[0].strategy, "last_write_wins");
    }
}
