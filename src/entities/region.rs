//! Region entity

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::TreeNode;

/// A region; names are unique among siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

impl TreeNode for Region {
    const TABLE: &'static str = "regions";
    const KIND: &'static str = "region";
    const COLUMNS: &'static str = "id, name, parent_id";
    const SIBLING_ORDER: &'static str = "name COLLATE NOCASE, id";
    const DEPENDENTS_SQL: &'static str = "SELECT COUNT(*) FROM members WHERE region_id = ?1";
    const DEPENDENTS_LABEL: &'static str = "member(s)";

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
        Ok(Region {
            id: row.get(0)?,
            name: row.get(1)?,
            parent_id: row.get(2)?,
        })
    }

    fn insert(conn: &Connection, name: &str, parent_id: Option<i64>) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO regions (name, parent_id) VALUES (?1, ?2)",
            params![name, parent_id],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
