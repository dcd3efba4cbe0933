//! Conflict resolution for incoming sync writes
//!
//! Timestamp-only last-write-wins. The store does not track revision
//! ancestry, so two concurrent edits never produce sibling conflict
//! revisions: one side is always discarded. This is a known limitation of
//! the protocol dialect, not something to paper over here.

use crate::models::{ParsedDocument, StoredDocument};

/// Outcome of resolving an incoming write against the stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Apply the incoming write
    Accept,
    /// Discard it: the stored document is as recent or newer
    Reject,
}

impl Resolution {
    /// Whether the incoming write should be applied
    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Decide whether `incoming` should replace `existing`.
///
/// Rules, in order:
/// 1. No stored document: accept (first write always wins).
/// 2. Incoming deletion: accept only if the stored timestamp is absent or
///    strictly older than the incoming one.
/// 3. Incoming update: accept if the stored timestamp is absent, or the
///    incoming timestamp is absent (treated as "now", newer than anything
///    stored), or strictly newer than the stored one.
/// 4. Otherwise reject; the stored document wins ties.
pub fn resolve(incoming: &ParsedDocument, existing: Option<&StoredDocument>) -> Resolution {
    let Some(existing) = existing else {
        return Resolution::Accept;
    };

    if incoming.deleted {
        return match (incoming.last_updated_at, existing.last_updated_at) {
            (_, None) => Resolution::Accept,
            (Some(incoming_ts), Some(existing_ts)) if incoming_ts > existing_ts => {
                Resolution::Accept
            }
            _ => Resolution::Reject,
        };
    }

    match (incoming.last_updated_at, existing.last_updated_at) {
        (_, None) | (None, _) => Resolution::Accept,
        (Some(incoming_ts), Some(existing_ts)) if incoming_ts > existing_ts => Resolution::Accept,
        _ => Resolution::Reject,
    }
}
