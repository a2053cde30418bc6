//! Member entity

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A person on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    /// Globally unique when present
    pub phone_number: Option<String>,
    pub is_schedulable: bool,
    pub region_id: Option<i64>,
    pub department_id: Option<i64>,
}

impl Member {
    /// Columns understood by [`Member::from_row`]
    pub const COLUMNS: &'static str =
        "id, name, phone_number, is_schedulable, region_id, department_id";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Member {
            id: row.get(0)?,
            name: row.get(1)?,
            phone_number: row.get(2)?,
            is_schedulable: row.get(3)?,
            region_id: row.get(4)?,
            department_id: row.get(5)?,
        })
    }

    /// The editable fields of this member
    pub fn to_draft(&self) -> MemberDraft {
        MemberDraft {
            name: self.name.clone(),
            phone_number: self.phone_number.clone(),
            is_schedulable: self.is_schedulable,
            region_id: self.region_id,
            department_id: self.department_id,
        }
    }
}

/// Member fields as written on insert/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDraft {
    pub name: String,
    pub phone_number: Option<String>,
    pub is_schedulable: bool,
    pub region_id: Option<i64>,
    pub department_id: Option<i64>,
}

impl Default for MemberDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone_number: None,
            is_schedulable: true,
            region_id: None,
            department_id: None,
        }
    }
}

/// Trim a phone number, mapping blank input to `None`
///
/// Blank phones are stored as NULL so they never collide on the unique index.
pub fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_blank_is_none() {
        assert_eq!(normalize_phone(None), None);
        assert_eq!(normalize_phone(Some("")), None);
        assert_eq!(normalize_phone(Some("   ")), None);
    }

    #[test]
    fn test_normalize_phone_trims() {
        assert_eq!(
            normalize_phone(Some(" 0912-345678 ")),
            Some("0912-345678".to_string())
        );
    }

    #[test]
    fn test_draft_defaults_to_schedulable() {
        let draft = MemberDraft::default();
        assert!(draft.is_schedulable);
        assert!(draft.name.is_empty());
    }
}
