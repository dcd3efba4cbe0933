//! Replicated document envelope and wire types for the sync protocol
//!
//! Clients speak a simplified CouchDB replication dialect: documents carry
//! `_id`, `_rev`, an optional `_deleted` tombstone flag, a `doc_type`
//! discriminator, and `last_updated_at` for last-write-wins ordering. All
//! remaining fields are the type-specific payload.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::submission::SubmissionBody;

/// Discriminator value for submission documents
pub const DOC_TYPE_SUBMISSION: &str = "submission";

const FIELD_ID: &str = "_id";
const FIELD_REV: &str = "_rev";
const FIELD_DELETED: &str = "_deleted";
const FIELD_DOC_TYPE: &str = "doc_type";
const FIELD_LAST_UPDATED_AT: &str = "last_updated_at";

/// A document as persisted in the store
///
/// Envelope fields live in dedicated columns; `payload` holds the
/// type-specific fields as JSON. Tombstoned rows keep their envelope
/// (`rev`, `last_updated_at`) so an older write can never resurrect the id,
/// but drop the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document id, stable across the document's lifetime
    pub id: String,
    /// Current revision token, set on every accepted write
    pub rev: Option<String>,
    /// Type discriminator, e.g. `"submission"`
    pub doc_type: Option<String>,
    /// Tombstone flag
    pub deleted: bool,
    /// Last-write-wins authority (unix ms)
    pub last_updated_at: Option<i64>,
    /// Optimistic-lock field, submissions only
    pub current_version: Option<i64>,
    /// Type-specific fields, absent on tombstones
    pub payload: Option<Value>,
}

impl StoredDocument {
    /// Render the document the way replication clients expect it: payload
    /// fields at the top level with the envelope merged in.
    pub fn to_wire(&self) -> Value {
        let mut map = match &self.payload {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Map::new(),
        };
        map.insert(FIELD_ID.to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            map.insert(FIELD_REV.to_string(), Value::String(rev.clone()));
        }
        if let Some(doc_type) = &self.doc_type {
            map.insert(FIELD_DOC_TYPE.to_string(), Value::String(doc_type.clone()));
        }
        if self.deleted {
            map.insert(FIELD_DELETED.to_string(), Value::Bool(true));
        }
        if let Some(ts) = self.last_updated_at {
            map.insert(FIELD_LAST_UPDATED_AT.to_string(), Value::from(ts));
        }
        if let Some(version) = self.current_version {
            map.insert("current_version".to_string(), Value::from(version));
        }
        Value::Object(map)
    }
}

/// Type-routed body of an incoming document
///
/// Known discriminators decode into their concrete shape; anything else is
/// carried verbatim as a generic payload, never dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DocBody {
    /// A validated submission payload
    Submission(Box<SubmissionBody>),
    /// Unknown or absent `doc_type`: raw payload fields
    Generic(Map<String, Value>),
}

/// An incoming document after envelope extraction and type routing
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// Document id from `_id`
    pub id: String,
    /// Client's revision from `_rev`
    pub incoming_rev: String,
    /// Type discriminator, if any
    pub doc_type: Option<String>,
    /// Whether this write is a deletion
    pub deleted: bool,
    /// Client's last-modified timestamp (unix ms), if any
    pub last_updated_at: Option<i64>,
    /// Type-routed payload
    pub body: DocBody,
}

/// Why an individual raw document could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocParseError {
    /// The `_id` of the offending document, when present
    pub id: Option<String>,
    /// Human-readable reason
    pub reason: String,
}

impl ParsedDocument {
    /// Extract the envelope from a raw document and route the remaining
    /// fields by `doc_type`.
    pub fn from_value(raw: &Value) -> Result<Self, DocParseError> {
        let Value::Object(fields) = raw else {
            return Err(DocParseError {
                id: None,
                reason: "document must be a JSON object".to_string(),
            });
        };

        let id = fields
            .get(FIELD_ID)
            .and_then(Value::as_str)
            .map(str::to_string);
        let incoming_rev = fields
            .get(FIELD_REV)
            .and_then(Value::as_str)
            .map(str::to_string);

        let (Some(id), Some(incoming_rev)) = (id, incoming_rev) else {
            return Err(DocParseError {
                id: fields
                    .get(FIELD_ID)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                reason: "Missing _id or _rev".to_string(),
            });
        };

        let deleted = fields
            .get(FIELD_DELETED)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let doc_type = fields
            .get(FIELD_DOC_TYPE)
            .and_then(Value::as_str)
            .map(str::to_string);
        let last_updated_at = match fields.get(FIELD_LAST_UPDATED_AT) {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_timestamp(value).ok_or_else(|| DocParseError {
                id: Some(id.clone()),
                reason: "Invalid last_updated_at".to_string(),
            })?),
        };

        let mut payload = fields.clone();
        for envelope_field in [FIELD_ID, FIELD_REV, FIELD_DELETED, FIELD_LAST_UPDATED_AT] {
            payload.remove(envelope_field);
        }

        let body = if doc_type.as_deref() == Some(DOC_TYPE_SUBMISSION) && !deleted {
            let submission: SubmissionBody = serde_json::from_value(Value::Object(payload))
                .map_err(|e| DocParseError {
                    id: Some(id.clone()),
                    reason: format!("Invalid submission payload: {e}"),
                })?;
            DocBody::Submission(Box::new(submission))
        } else {
            DocBody::Generic(payload)
        };

        Ok(Self {
            id,
            incoming_rev,
            doc_type,
            deleted,
            last_updated_at,
            body,
        })
    }
}

/// Accept either unix milliseconds or an RFC 3339 string
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// Request body of the bulk write endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct BulkDocsRequest {
    /// The documents to write, one result emitted per entry
    pub docs: Vec<Value>,
    /// Accepted in the request shape but not given special handling; clients
    /// replaying server-originated revisions go through the same LWW path.
    #[serde(default = "default_new_edits")]
    pub new_edits: bool,
}

const fn default_new_edits() -> bool {
    true
}

/// Per-document outcome of a bulk write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BulkDocResult {
    /// The write was accepted and committed
    Accepted {
        /// Always true
        ok: bool,
        /// Document id
        id: String,
        /// The newly assigned revision
        rev: String,
    },
    /// The write was rejected or failed
    Rejected {
        /// Document id, when it could be determined
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Error kind: `bad_request`, `conflict`, or `internal_error`
        error: String,
        /// Human-readable reason
        reason: String,
    },
}

impl BulkDocResult {
    pub fn accepted(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self::Accepted {
            ok: true,
            id: id.into(),
            rev: rev.into(),
        }
    }

    pub fn bad_request(id: Option<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            id,
            error: "bad_request".to_string(),
            reason: reason.into(),
        }
    }

    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Rejected {
            id: Some(id.into()),
            error: "conflict".to_string(),
            reason: "Document update conflict - server version is newer".to_string(),
        }
    }

    pub fn internal_error(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            id: Some(id.into()),
            error: "internal_error".to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this result reports an accepted write
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Revisions the server does not have for one document id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRevs {
    /// Client revisions unknown to the server
    pub missing: Vec<String>,
}

/// One entry of a future `_changes` feed
///
/// The feed itself is unimplemented: it needs a monotonically increasing
/// sequence number assigned at each accepted write, which the current write
/// path does not produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeItem {
    /// Sequence id of this change
    pub seq: i64,
    /// Document id
    pub id: String,
    /// Revisions involved, `[{"rev": ...}]`
    pub changes: Vec<Value>,
    /// Tombstone marker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// Response shape of a future `_changes` feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesResponse {
    /// Changes since the requested sequence
    pub results: Vec<ChangeItem>,
    /// Highest sequence included
    pub last_seq: i64,
}
