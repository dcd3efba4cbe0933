//! Submission version ledger
//!
//! Each submission document owns an append-only list of versions. Appending
//! requires the caller to present the version number it believes is current;
//! the store applies the append as a single conditional write, so out of N
//! concurrent appends carrying the same expectation exactly one succeeds and
//! the rest observe a mismatch. Version numbers are never skipped or reused.

use chrono::Utc;

use crate::db::DocumentStore;
use crate::error::{Error, Result};
use crate::models::{
    submission_doc_id, NewVersion, StoredDocument, Submission, DOC_TYPE_SUBMISSION,
    STRATEGY_OPTIMISTIC_LOCK,
};
use crate::sync::revision::RevisionGenerator;

/// Manages submission documents and their version history
pub struct SubmissionLedger<'a, S> {
    store: &'a S,
    revisions: &'a RevisionGenerator,
}

impl<'a, S: DocumentStore> SubmissionLedger<'a, S> {
    /// Create a ledger over the given store and revision generator
    pub const fn new(store: &'a S, revisions: &'a RevisionGenerator) -> Self {
        Self { store, revisions }
    }

    /// Fetch a submission by document id; tombstoned documents read as gone
    pub async fn get(&self, doc_id: &str) -> Result<Option<Submission>> {
        match self.store.get(doc_id).await? {
            Some(doc) if !doc.deleted => Ok(Some(Submission::from_stored(&doc)?)),
            _ => Ok(None),
        }
    }

    /// Create the submission document for an (assignment, student) pair with
    /// its first version.
    ///
    /// Callers are expected to have checked for an existing document; this
    /// fails with `AlreadyExists` as a last-resort guard when they raced.
    pub async fn create_first(
        &self,
        assignment_id: &str,
        student_id: &str,
        team_id: &str,
        version_data: NewVersion,
    ) -> Result<Submission> {
        let doc_id = submission_doc_id(assignment_id, student_id);
        let now = Utc::now().timestamp_millis();

        let submission = Submission {
            id: doc_id.clone(),
            rev: Some(self.revisions.next()),
            assignment_id: assignment_id.to_string(),
            student_id: student_id.to_string(),
            team_id: team_id.to_string(),
            current_version: 1,
            versions: vec![version_data.into_version(1, now)],
            last_updated_at: Some(now),
        };

        let inserted = self
            .store
            .insert_new(&StoredDocument {
                id: submission.id.clone(),
                rev: submission.rev.clone(),
                doc_type: Some(DOC_TYPE_SUBMISSION.to_string()),
                deleted: false,
                last_updated_at: submission.last_updated_at,
                current_version: Some(1),
                payload: Some(submission.doc_payload()),
            })
            .await?;

        if !inserted {
            return Err(Error::AlreadyExists(doc_id));
        }

        tracing::debug!(id = %submission.id, "submission created");
        Ok(submission)
    }

    /// Append the next version iff the document is still at
    /// `expected_current_version`.
    ///
    /// Returns `Ok(None)` on an optimistic-lock mismatch; nothing is mutated
    /// and the caller must re-fetch before retrying. The accepted entry is
    /// numbered `expected_current_version + 1` and stamped server-side.
    pub async fn append_version(
        &self,
        doc_id: &str,
        version_data: NewVersion,
        expected_current_version: i64,
    ) -> Result<Option<Submission>> {
        let now = Utc::now().timestamp_millis();
        let entry = version_data.into_version(expected_current_version + 1, now);
        let new_rev = self.revisions.next();

        let applied = self
            .store
            .push_version(doc_id, &entry, expected_current_version, &new_rev, now)
            .await?;

        if !applied {
            tracing::debug!(
                id = %doc_id,
                expected = expected_current_version,
                "optimistic lock failed on version append"
            );
            let existing_ts = self
                .store
                .get(doc_id)
                .await?
                .and_then(|doc| doc.last_updated_at);
            self.store
                .record_conflict(doc_id, existing_ts, Some(now), STRATEGY_OPTIMISTIC_LOCK, now)
                .await?;
            return Ok(None);
        }

        let updated = self
            .get(doc_id)
            .await?
            .ok_or_else(|| Error::NotFound(doc_id.to_string()))?;
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{Database, LibSqlDocumentStore};

    fn version(file: &str) -> NewVersion {
        NewVersion {
            file_url: format!("https://files/{file}"),
            content_hash: None,
            notes: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_first_submission() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        let submission = ledger
            .create_first("a1", "s1", "t1", version("v1.pdf"))
            .await
            .unwrap();

        assert_eq!(submission.id, "sub_a1_s1");
        assert_eq!(submission.current_version, 1);
        assert_eq!(submission.versions.len(), 1);
        assert_eq!(submission.versions[0].version, 1);
        assert!(submission.rev.is_some());

        let fetched = ledger.get("sub_a1_s1").await.unwrap().unwrap();
        assert_eq!(fetched, submission);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_first_rejects_duplicate() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        ledger
            .create_first("a1", "s1", "t1", version("v1.pdf"))
            .await
            .unwrap();
        let err = ledger
            .create_first("a1", "s1", "t1", version("again.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_version_increments_by_one() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        let created = ledger
            .create_first("a1", "s1", "t1", version("v1.pdf"))
            .await
            .unwrap();

        let updated = ledger
            .append_version("sub_a1_s1", version("v2.pdf"), 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.current_version, 2);
        assert_eq!(updated.versions.len(), 2);
        assert_eq!(updated.versions[1].version, 2);
        assert_eq!(updated.versions[1].file_url, "https://files/v2.pdf");
        // Every accepted write moves the revision
        assert_ne!(updated.rev, created.rev);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_expectation_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        ledger
            .create_first("a1", "s1", "t1", version("v1.pdf"))
            .await
            .unwrap();
        ledger
            .append_version("sub_a1_s1", version("v2.pdf"), 1)
            .await
            .unwrap()
            .unwrap();

        // Second client still believes the document is at version 1
        let stale = ledger
            .append_version("sub_a1_s1", version("late.pdf"), 1)
            .await
            .unwrap();
        assert!(stale.is_none());

        // Nothing from the losing call landed
        let submission = ledger.get("sub_a1_s1").await.unwrap().unwrap();
        assert_eq!(submission.current_version, 2);
        assert_eq!(submission.versions.len(), 2);
        assert!(submission
            .versions
            .iter()
            .all(|v| v.file_url != "https://files/late.pdf"));

        // The mismatch is recorded as a conflict
        let conflicts = store.list_conflicts("sub_a1_s1").await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].strategy, "optimistic_lock");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_to_unknown_document_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        let result = ledger
            .append_version("sub_ghost", version("v1.pdf"), 1)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_version_numbers_are_contiguous() {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlDocumentStore::new(db.connection());
        let revisions = RevisionGenerator::new();
        let ledger = SubmissionLedger::new(&store, &revisions);

        ledger
            .create_first("a1", "s1", "t1", version("v1.pdf"))
            .await
            .unwrap();
        for expected in 1..5 {
            ledger
                .append_version("sub_a1_s1", version(&format!("v{}.pdf", expected + 1)), expected)
                .await
                .unwrap()
                .unwrap();
        }

        let submission = ledger.get("sub_a1_s1").await.unwrap().unwrap();
        assert_eq!(submission.current_version, 5);
        let numbers: Vec<i64> = submission.versions.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }
}
