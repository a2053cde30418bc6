//! Position entity
//!
//! Positions form a tree like regions, but siblings also carry a `rank` that
//! fixes their display order and can be changed by hand (move up/down,
//! drag-and-drop reordering). Ranks are contiguous by convention only.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::TreeNode;

/// A position (role) a member can hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub rank: i64,
}

/// Next free rank among the children of `parent_id`
fn next_sibling_rank(conn: &Connection, parent_id: Option<i64>) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(rank) + 1, 0) FROM positions WHERE parent_id IS ?1",
        params![parent_id],
        |row| row.get(0),
    )
}

impl TreeNode for Position {
    const TABLE: &'static str = "positions";
    const KIND: &'static str = "position";
    const COLUMNS: &'static str = "id, name, parent_id, rank";
    const SIBLING_ORDER: &'static str = "rank, id";
    const DEPENDENTS_SQL: &'static str =
        "SELECT COUNT(*) FROM member_positions WHERE position_id = ?1";
    const DEPENDENTS_LABEL: &'static str = "member assignment(s)";

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Position {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
            rank: row.get(3)?,
        })
    }

    fn insert(conn: &Connection, name: &str, parent_id: Option<i64>) -> rusqlite::Result<i64> {
        let rank = next_sibling_rank(conn, parent_id)?;
        conn.execute(
            "INSERT INTO positions (name, parent_id, rank) VALUES (?1, ?2, ?3)",
            params![name, parent_id, rank],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// A position that changes parent is appended after its new siblings
    fn update(
        conn: &Connection,
        id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> rusqlite::Result<usize> {
        let current_parent: Option<i64> = conn.query_row(
            "SELECT parent_id FROM positions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        if current_parent == parent_id {
            return conn.execute(
                "UPDATE positions SET name = ?1 WHERE id = ?2",
                params![name, id],
            );
        }

        let rank = next_sibling_rank(conn, parent_id)?;
        conn.execute(
            "UPDATE positions SET name = ?1, parent_id = ?2, rank = ?3 WHERE id = ?4",
            params![name, parent_id, rank, id],
        )
    }
}
