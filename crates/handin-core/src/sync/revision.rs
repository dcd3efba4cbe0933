//! Revision token generation
//!
//! Revisions are `{unix_millis}-{random}` strings: the millisecond prefix
//! orders revisions well enough to break last-write-wins ties, the random
//! suffix makes collisions within the same millisecond a non-issue. This is
//! deliberately not CouchDB's deterministic content hashing; the store
//! keeps only a single current revision per document.

use chrono::Utc;
use uuid::Uuid;

/// Generates a fresh revision token per accepted write
///
/// Constructed once and passed to the components that need it; generation
/// itself cannot fail and has no side effects.
#[derive(Debug, Default, Clone)]
pub struct RevisionGenerator;

impl RevisionGenerator {
    /// Create a new generator
    pub const fn new() -> Self {
        Self
    }

    /// Produce the next revision token
    pub fn next(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{millis}-{}", &suffix[..8])
    }
}
