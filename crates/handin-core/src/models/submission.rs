//! Submission model
//!
//! A submission is one document per (assignment, student) pair holding an
//! append-only list of uploaded versions. The id is derived
//! deterministically so repeated uploads from the same student collide on
//! the same document instead of creating duplicates.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::document::StoredDocument;

/// Derive the document id for an (assignment, student) pair
pub fn submission_doc_id(assignment_id: &str, student_id: &str) -> String {
    format!("sub_{assignment_id}_{student_id}")
}

/// One uploaded version of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionVersion {
    /// 1-based version number, strictly increasing, never reused
    pub version: i64,
    /// URL of the uploaded file (upload itself happens elsewhere)
    pub file_url: String,
    /// Server-stamped upload time (unix ms)
    pub submitted_at: i64,
    /// Optional hash to detect identical files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Optional student notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Payload shape of a `doc_type = "submission"` document on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionBody {
    /// Assignment this submission belongs to
    pub assignment_id: String,
    /// Submitting student
    pub student_id: String,
    /// Team context resolved at creation time
    pub team_id: String,
    /// Version number of the latest entry (equals `versions.len()`)
    #[serde(default)]
    pub current_version: i64,
    /// Append-only version history
    #[serde(default)]
    pub versions: Vec<SubmissionVersion>,
}

/// A submission as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Document id (`sub_{assignment_id}_{student_id}`)
    pub id: String,
    /// Current revision token
    pub rev: Option<String>,
    pub assignment_id: String,
    pub student_id: String,
    pub team_id: String,
    /// Version number of the latest entry
    pub current_version: i64,
    /// Append-only version history, ordered by version
    pub versions: Vec<SubmissionVersion>,
    /// Last-write-wins timestamp (unix ms)
    pub last_updated_at: Option<i64>,
}

impl Submission {
    /// The latest version entry, if any
    pub fn latest_version(&self) -> Option<&SubmissionVersion> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.version == self.current_version)
    }

    /// Payload JSON as persisted in the store; `current_version` lives in
    /// its own column (the optimistic-lock field), not in the payload.
    pub fn doc_payload(&self) -> Value {
        json!({
            "doc_type": super::document::DOC_TYPE_SUBMISSION,
            "assignment_id": self.assignment_id,
            "student_id": self.student_id,
            "team_id": self.team_id,
            "versions": self.versions,
        })
    }

    /// Reassemble a submission from a stored document row
    pub fn from_stored(doc: &StoredDocument) -> Result<Self> {
        let payload = doc
            .payload
            .as_ref()
            .ok_or_else(|| Error::NotFound(doc.id.clone()))?;
        let body: StoredSubmissionPayload = serde_json::from_value(payload.clone())?;
        Ok(Self {
            id: doc.id.clone(),
            rev: doc.rev.clone(),
            assignment_id: body.assignment_id,
            student_id: body.student_id,
            team_id: body.team_id,
            current_version: doc.current_version.unwrap_or(0),
            versions: body.versions,
            last_updated_at: doc.last_updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StoredSubmissionPayload {
    assignment_id: String,
    student_id: String,
    team_id: String,
    #[serde(default)]
    versions: Vec<SubmissionVersion>,
}

/// Input for creating or appending a submission version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    /// URL of the already-uploaded file
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewVersion {
    /// Materialize this input as version `version` stamped at `now`
    pub fn into_version(self, version: i64, now: i64) -> SubmissionVersion {
        SubmissionVersion {
            version,
            file_url: self.file_url,
            submitted_at: now,
            content_hash: self.content_hash,
            notes: self.notes,
        }
    }
}
