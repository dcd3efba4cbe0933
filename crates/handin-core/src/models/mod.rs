//! Data models for handin

mod directory;
mod document;
mod submission;
mod sync_conflict;

pub use directory::{AssignmentInfo, TeamInfo};
pub use document::{
    BulkDocResult, BulkDocsRequest, ChangeItem, ChangesResponse, DocBody, DocParseError,
    MissingRevs, ParsedDocument, StoredDocument, DOC_TYPE_SUBMISSION,
};
pub use submission::{
    submission_doc_id, NewVersion, Submission, SubmissionBody, SubmissionVersion,
};
pub use sync_conflict::{SyncConflict, STRATEGY_LAST_WRITE_WINS, STRATEGY_OPTIMISTIC_LOCK};
