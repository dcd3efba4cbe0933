//! Read-only views of the portal's CRUD data
//!
//! The sync core only needs to know which team an assignment belongs to and
//! who is in that team, to authorize a submission before it enters the
//! write path. These lookups have no side effects on the sync data.

use serde::{Deserialize, Serialize};

/// Assignment context for a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentInfo {
    /// Assignment id
    pub id: String,
    /// Display title
    pub title: String,
    /// Team the assignment was issued to
    pub team_id: String,
    /// Optional due date (unix ms)
    pub due_date: Option<i64>,
}

/// Team membership context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Team id
    pub id: String,
    /// The team's administrator
    pub admin_id: String,
    /// Student members
    pub member_ids: Vec<String>,
}

impl TeamInfo {
    /// Whether `user_id` is a member of this team
    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }

    /// Whether `user_id` administers this team
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id == user_id
    }
}
