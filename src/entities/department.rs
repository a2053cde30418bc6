//! Department entity

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Flat grouping of members; names are globally unique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
}

impl Department {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Department {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}
