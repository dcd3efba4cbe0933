//! Bulk sync processor
//!
//! Applies a client batch of replicated documents one at a time: parse,
//! resolve against the stored state, write if accepted. Exactly one result
//! is emitted per input document, in input order; a bad document never
//! aborts its siblings. The batch is not transactional - replication is
//! document-at-a-time by design.

use chrono::Utc;
use serde_json::{json, Value};

use crate::db::DocumentStore;
use crate::models::{
    BulkDocResult, DocBody, ParsedDocument, StoredDocument, STRATEGY_LAST_WRITE_WINS,
};
use crate::sync::conflict::{self, Resolution};
use crate::sync::revision::RevisionGenerator;

/// Processes `_bulk_docs` batches against a document store
pub struct BulkSyncProcessor<'a, S> {
    store: &'a S,
    revisions: &'a RevisionGenerator,
}

impl<'a, S: DocumentStore> BulkSyncProcessor<'a, S> {
    /// Create a processor over the given store and revision generator
    pub const fn new(store: &'a S, revisions: &'a RevisionGenerator) -> Self {
        Self { store, revisions }
    }

    /// Process a batch, returning one result per input document
    pub async fn process_batch(&self, docs: &[Value]) -> Vec<BulkDocResult> {
        // Parse everything up front so the existing-document lookup can be
        // batched over the whole input set.
        let parsed: Vec<Result<ParsedDocument, BulkDocResult>> = docs
            .iter()
            .map(|raw| {
                ParsedDocument::from_value(raw)
                    .map_err(|err| BulkDocResult::bad_request(err.id, err.reason))
            })
            .collect();

        let ids: Vec<String> = parsed
            .iter()
            .filter_map(|p| p.as_ref().ok().map(|doc| doc.id.clone()))
            .collect();

        let existing = match self.store.get_many(&ids).await {
            Ok(existing) => existing,
            Err(e) => {
                // The whole batch is unreadable; report per document anyway
                tracing::warn!("bulk lookup failed: {e}");
                return parsed
                    .into_iter()
                    .map(|p| match p {
                        Ok(doc) => BulkDocResult::internal_error(doc.id, e.to_string()),
                        Err(result) => result,
                    })
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(docs.len());
        for entry in parsed {
            let doc = match entry {
                Ok(doc) => doc,
                Err(result) => {
                    results.push(result);
                    continue;
                }
            };
            let prior = existing.get(doc.id.as_str());
            results.push(self.process_one(doc, prior).await);
        }

        results
    }

    async fn process_one(
        &self,
        doc: ParsedDocument,
        existing: Option<&StoredDocument>,
    ) -> BulkDocResult {
        let now = Utc::now().timestamp_millis();
        let new_rev = self.revisions.next();

        match conflict::resolve(&doc, existing) {
            Resolution::Accept => match self.apply(&doc, &new_rev, now).await {
                Ok(()) => {
                    tracing::debug!(id = %doc.id, rev = %new_rev, deleted = doc.deleted, "sync write accepted");
                    BulkDocResult::accepted(doc.id, new_rev)
                }
                Err(e) => {
                    tracing::warn!(id = %doc.id, "sync write failed: {e}");
                    BulkDocResult::internal_error(doc.id, e.to_string())
                }
            },
            Resolution::Reject => {
                tracing::debug!(
                    id = %doc.id,
                    incoming_rev = %doc.incoming_rev,
                    "sync write rejected, server version is newer"
                );
                let existing_ts = existing.and_then(|e| e.last_updated_at);
                if let Err(e) = self
                    .store
                    .record_conflict(
                        &doc.id,
                        existing_ts,
                        doc.last_updated_at,
                        STRATEGY_LAST_WRITE_WINS,
                        now,
                    )
                    .await
                {
                    tracing::warn!(id = %doc.id, "failed to record conflict: {e}");
                }
                BulkDocResult::conflict(doc.id)
            }
        }
    }

    async fn apply(&self, doc: &ParsedDocument, new_rev: &str, now: i64) -> crate::Result<()> {
        if doc.deleted {
            return self
                .store
                .tombstone(&doc.id, new_rev, doc.doc_type.as_deref(), now)
                .await;
        }

        let (current_version, payload) = match &doc.body {
            DocBody::Submission(body) => (
                Some(body.current_version),
                json!({
                    "doc_type": crate::models::DOC_TYPE_SUBMISSION,
                    "assignment_id": body.assignment_id,
                    "student_id": body.student_id,
                    "team_id": body.team_id,
                    "versions": body.versions,
                }),
            ),
            DocBody::Generic(fields) => (None, Value::Object(fields.clone())),
        };

        self.store
            .put(&StoredDocument {
                id: doc.id.clone(),
                rev: Some(new_rev.to_string()),
                doc_type: doc.doc_type.clone(),
                deleted: false,
                last_updated_at: Some(now),
                current_version,
                payload: Some(payload),
            })
            .await
    }
}
