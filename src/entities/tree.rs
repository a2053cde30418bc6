//! Shared shape of the self-referential tree entities
//!
//! Regions and positions are stored as flat tables with a nullable
//! `parent_id` pointing back into the same table. Everything the tree
//! repository needs to know about a concrete table is described here, so the
//! descendant/possible-parent logic is written once.

use rusqlite::{params, Connection, Row};

/// A node stored in a self-referential table
pub trait TreeNode: Clone + std::fmt::Debug {
    /// Table holding the nodes
    const TABLE: &'static str;

    /// Kind used in messages ("region", "position")
    const KIND: &'static str;

    /// Column list understood by [`TreeNode::from_row`], in order
    const COLUMNS: &'static str;

    /// ORDER BY expression used when siblings are displayed
    const SIBLING_ORDER: &'static str;

    /// Count query for rows in other tables that reference a node (`?1` = id)
    const DEPENDENTS_SQL: &'static str;

    /// What the dependent rows are, for error messages
    const DEPENDENTS_LABEL: &'static str;

    fn id(&self) -> i64;

    fn name(&self) -> &str;

    fn parent_id(&self) -> Option<i64>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Insert a new node and return its id
    fn insert(conn: &Connection, name: &str, parent_id: Option<i64>) -> rusqlite::Result<i64>;

    /// Write name and parent of an existing node
    fn update(
        conn: &Connection,
        id: i64,
        name: &str,
        parent_id: Option<i64>,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "UPDATE {} SET name = ?1, parent_id = ?2 WHERE id = ?3",
                Self::TABLE
            ),
            params![name, parent_id, id],
        )
    }
}
