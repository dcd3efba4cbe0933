//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Strategy name recorded for last-write-wins rejections
pub const STRATEGY_LAST_WRITE_WINS: &str = "last_write_wins";
/// Strategy name recorded for optimistic-lock mismatches
pub const STRATEGY_OPTIMISTIC_LOCK: &str = "optimistic_lock";

/// Recorded sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Document involved in the conflict
    pub doc_id: String,
    /// Existing row's timestamp when conflict occurred (unix ms)
    pub existing_updated_at: Option<i64>,
    /// Incoming write's timestamp that was rejected (unix ms)
    pub incoming_updated_at: Option<i64>,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
