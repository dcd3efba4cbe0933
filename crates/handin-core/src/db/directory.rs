//! Directory repository: read-only assignment and team lookups
//!
//! The portal's CRUD layer owns these tables; the sync core only reads them
//! to resolve which team context a submission belongs to.

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{AssignmentInfo, TeamInfo};

/// Trait for directory lookups (async)
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Get an assignment by id
    async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentInfo>>;

    /// Get a team with its membership by id
    async fn get_team(&self, id: &str) -> Result<Option<TeamInfo>>;
}

/// libSQL implementation of `Directory`
pub struct LibSqlDirectory<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlDirectory<'a> {
    /// Create a new directory with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl Directory for LibSqlDirectory<'_> {
    async fn get_assignment(&self, id: &str) -> Result<Option<AssignmentInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, team_id, due_date FROM assignments WHERE id = ?",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(AssignmentInfo {
                id: row.get(0)?,
                title: row.get(1)?,
                team_id: row.get(2)?,
                due_date: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_team(&self, id: &str) -> Result<Option<TeamInfo>> {
        let mut rows = self
            .conn
            .query("SELECT id, admin_id FROM teams WHERE id = ?", params![id])
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let team_id: String = row.get(0)?;
        let admin_id: String = row.get(1)?;

        let mut member_rows = self
            .conn
            .query(
                "SELECT user_id FROM team_members WHERE team_id = ? ORDER BY user_id",
                params![team_id.as_str()],
            )
            .await?;

        let mut member_ids = Vec::new();
        while let Some(member) = member_rows.next().await? {
            member_ids.push(member.get(0)?);
        }

        Ok(Some(TeamInfo {
            id: team_id,
            admin_id,
            member_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    async fn seed(conn: &Connection) {
        conn.execute(
            "INSERT INTO teams (id, admin_id) VALUES ('t1', 'prof')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO team_members (team_id, user_id) VALUES ('t1', 's1'), ('t1', 's2')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO assignments (id, title, team_id, due_date) VALUES ('a1', 'Lab 1', 't1', 1700000000000)",
            (),
        )
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_assignment() {
        let db = Database::open_in_memory().await.unwrap();
        seed(db.connection()).await;
        let directory = LibSqlDirectory::new(db.connection());

        let assignment = directory.get_assignment("a1").await.unwrap().unwrap();
        assert_eq!(assignment.team_id, "t1");
        assert_eq!(assignment.title, "Lab 1");
        assert_eq!(assignment.due_date, Some(1_700_000_000_000));

        assert!(directory.get_assignment("nope").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_team_with_members() {
        let db = Database::open_in_memory().await.unwrap();
        seed(db.connection()).await;
        let directory = LibSqlDirectory::new(db.connection());

        let team = directory.get_team("t1").await.unwrap().unwrap();
        assert_eq!(team.admin_id, "prof");
        assert_eq!(team.member_ids, vec!["s1", "s2"]);
        assert!(team.is_member("s1"));
        assert!(!team.is_member("intruder"));

        assert!(directory.get_team("nope").await.unwrap().is_none());
    }
}
