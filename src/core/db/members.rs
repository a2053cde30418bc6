//! Member rows

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::Serialize;
use tracing::info;

use crate::core::error::{violates_unique, StoreError, StoreResult};
use crate::entities::{Member, MemberDraft};

/// Column a member listing is sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MemberSort {
    #[default]
    Name,
    Phone,
    Schedulable,
    Region,
}

impl MemberSort {
    fn order_by(self) -> &'static str {
        match self {
            MemberSort::Name => "m.name COLLATE NOCASE",
            MemberSort::Phone => "m.phone_number",
            MemberSort::Schedulable => "m.is_schedulable",
            MemberSort::Region => "r.name COLLATE NOCASE",
        }
    }
}

impl fmt::Display for MemberSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberSort::Name => write!(f, "name"),
            MemberSort::Phone => write!(f, "phone"),
            MemberSort::Schedulable => write!(f, "schedulable"),
            MemberSort::Region => write!(f, "region"),
        }
    }
}

impl FromStr for MemberSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(MemberSort::Name),
            "phone" => Ok(MemberSort::Phone),
            "schedulable" => Ok(MemberSort::Schedulable),
            "region" => Ok(MemberSort::Region),
            _ => Err(format!("Unknown sort column: {}", s)),
        }
    }
}

/// Filter for member listings
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    /// Substring of the member name
    pub search: Option<String>,
    pub region_id: Option<i64>,
    pub sort: MemberSort,
    pub descending: bool,
}

/// A member row joined with display names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub id: i64,
    pub name: String,
    pub phone_number: Option<String>,
    pub is_schedulable: bool,
    pub region: Option<String>,
    pub department: Option<String>,
    pub primary_position: Option<String>,
}

pub struct MemberRepository<'c> {
    conn: &'c Connection,
}

impl<'c> MemberRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: i64) -> StoreResult<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE id = ?1", Member::COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], Member::from_row)
            .optional()?)
    }

    pub fn require(&self, id: i64) -> StoreResult<Member> {
        self.get(id)?
            .ok_or_else(|| StoreError::not_found("member", id))
    }

    pub fn all(&self) -> StoreResult<Vec<Member>> {
        let sql = format!(
            "SELECT {} FROM members ORDER BY name COLLATE NOCASE, id",
            Member::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Member::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// First member with exactly this name
    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<Member>> {
        let sql = format!(
            "SELECT {} FROM members WHERE name = ?1 ORDER BY id LIMIT 1",
            Member::COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![name], Member::from_row)
            .optional()?)
    }

    /// Filtered, sorted listing with region/department/primary position names
    pub fn search(&self, filter: &MemberFilter) -> StoreResult<Vec<MemberSummary>> {
        let mut sql = String::from(
            "SELECT m.id, m.name, m.phone_number, m.is_schedulable, r.name, d.name,
                    (SELECT p.name FROM member_positions mp
                       JOIN positions p ON p.id = mp.position_id
                      WHERE mp.member_id = m.id AND mp.is_primary = 1
                      LIMIT 1)
             FROM members m
             LEFT JOIN regions r ON r.id = m.region_id
             LEFT JOIN departments d ON d.id = m.department_id
             WHERE 1=1",
        );
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref search) = filter.search {
            let search = search.trim();
            if !search.is_empty() {
                let pattern = format!("%{}%", search);
                sql.push_str(" AND (m.name LIKE ? OR m.phone_number LIKE ?)");
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }
        }

        if let Some(region_id) = filter.region_id {
            sql.push_str(" AND m.region_id = ?");
            params_vec.push(Box::new(region_id));
        }

        let direction = if filter.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(
            " ORDER BY {} {}, m.id {}",
            filter.sort.order_by(),
            direction,
            direction
        ));

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(MemberSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                phone_number: row.get(2)?,
                is_schedulable: row.get(3)?,
                region: row.get(4)?,
                department: row.get(5)?,
                primary_position: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Insert a member row, returning its id
    ///
    /// Runs on whatever connection or transaction the repository was built
    /// over; a duplicate phone is reported as [`StoreError::DuplicatePhone`].
    pub fn insert(&self, draft: &MemberDraft) -> StoreResult<i64> {
        self.conn
            .execute(
                "INSERT INTO members (name, phone_number, is_schedulable, region_id, department_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    draft.name,
                    draft.phone_number,
                    draft.is_schedulable,
                    draft.region_id,
                    draft.department_id
                ],
            )
            .map_err(|e| classify_member_error(e, draft))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn update(&self, id: i64, draft: &MemberDraft) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE members
                    SET name = ?1, phone_number = ?2, is_schedulable = ?3,
                        region_id = ?4, department_id = ?5
                  WHERE id = ?6",
                params![
                    draft.name,
                    draft.phone_number,
                    draft.is_schedulable,
                    draft.region_id,
                    draft.department_id,
                    id
                ],
            )
            .map_err(|e| classify_member_error(e, draft))?;
        if changed == 0 {
            return Err(StoreError::not_found("member", id));
        }
        Ok(())
    }

    /// Set the region and, when given, the phone of an existing member
    pub fn update_contact(&self, id: i64, phone: Option<&str>, region_id: Option<i64>) -> StoreResult<()> {
        self.conn
            .execute(
                "UPDATE members SET phone_number = COALESCE(?1, phone_number), region_id = ?2
                  WHERE id = ?3",
                params![phone, region_id, id],
            )
            .map_err(|e| {
                if violates_unique(&e, "members", "phone_number") {
                    StoreError::DuplicatePhone {
                        phone: phone.unwrap_or_default().to_string(),
                    }
                } else {
                    StoreError::Storage(e)
                }
            })?;
        Ok(())
    }

    /// Delete a member; its position assignments cascade
    pub fn delete(&self, id: i64) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute("DELETE FROM members WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::not_found("member", id));
        }
        tx.commit()?;
        info!("deleted member {}", id);
        Ok(())
    }

    pub fn count(&self) -> StoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?)
    }
}

fn classify_member_error(err: rusqlite::Error, draft: &MemberDraft) -> StoreError {
    if violates_unique(&err, "members", "phone_number") {
        return StoreError::DuplicatePhone {
            phone: draft.phone_number.clone().unwrap_or_default(),
        };
    }
    StoreError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::fixtures;

    fn draft(name: &str, phone: Option<&str>) -> MemberDraft {
        MemberDraft {
            name: name.into(),
            phone_number: phone.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_get() {
        let db = fixtures::db();
        let id = db.members().insert(&draft("Ann", Some("0911"))).unwrap();

        let ann = db.members().require(id).unwrap();
        assert_eq!(ann.name, "Ann");
        assert_eq!(ann.phone_number.as_deref(), Some("0911"));
        assert!(ann.is_schedulable);
    }

    #[test]
    fn test_duplicate_phone_is_classified() {
        let db = fixtures::db();
        db.members().insert(&draft("Ann", Some("0911"))).unwrap();

        let err = db.members().insert(&draft("Bob", Some("0911"))).unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePhone { ref phone } if phone == "0911"));
    }

    #[test]
    fn test_null_phones_never_collide() {
        let db = fixtures::db();
        db.members().insert(&draft("Ann", None)).unwrap();
        db.members().insert(&draft("Bob", None)).unwrap();
        assert_eq!(db.members().count().unwrap(), 2);
    }

    #[test]
    fn test_update_missing_member() {
        let db = fixtures::db();
        let err = db.members().update(42, &draft("Ghost", None)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_delete_cascades_assignments() {
        let db = fixtures::db();
        let pos = fixtures::position(&db, "Coach", None);
        let m = fixtures::member(&db, "Ann", None);
        fixtures::assign(&db, m, pos, true);

        db.members().delete(m).unwrap();
        let remaining: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM member_positions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_search_filters_and_sorts() {
        let db = fixtures::db();
        let east = fixtures::region(&db, "East", None);
        let west = fixtures::region(&db, "West", None);
        let repo = db.members();
        repo.insert(&MemberDraft {
            region_id: Some(west),
            ..draft("Carol", Some("0933"))
        })
        .unwrap();
        repo.insert(&MemberDraft {
            region_id: Some(east),
            ..draft("Alice", Some("0922"))
        })
        .unwrap();
        repo.insert(&MemberDraft {
            region_id: Some(east),
            ..draft("Alan", None)
        })
        .unwrap();

        let by_name: Vec<String> = repo
            .search(&MemberFilter::default())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(by_name, vec!["Alan", "Alice", "Carol"]);

        let filter = MemberFilter {
            search: Some("al".into()),
            region_id: Some(east),
            sort: MemberSort::Name,
            descending: true,
        };
        let found = repo.search(&filter).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "Alice");
        assert_eq!(found[0].region.as_deref(), Some("East"));

        let by_region = repo
            .search(&MemberFilter {
                sort: MemberSort::Region,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_region.last().map(|m| m.name.as_str()), Some("Carol"));
    }

    #[test]
    fn test_search_matches_phone_numbers() {
        let db = fixtures::db();
        fixtures::member(&db, "Dora", Some("0912-345"));
        fixtures::member(&db, "Eli", Some("0987"));
        fixtures::member(&db, "Fay", None);

        let found = db
            .members()
            .search(&MemberFilter {
                search: Some("345".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Dora");

        let found = db
            .members()
            .search(&MemberFilter {
                search: Some("09".into()),
                ..Default::default()
            })
            .unwrap();
        let names: Vec<&str> = found.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Dora", "Eli"]);
    }

    #[test]
    fn test_search_reports_primary_position() {
        let db = fixtures::db();
        let coach = fixtures::position(&db, "Coach", None);
        let clerk = fixtures::position(&db, "Clerk", None);
        let m = fixtures::member(&db, "Ann", None);
        fixtures::assign(&db, m, clerk, false);
        fixtures::assign(&db, m, coach, true);

        let found = db.members().search(&MemberFilter::default()).unwrap();
        assert_eq!(found[0].primary_position.as_deref(), Some("Coach"));
    }

    #[test]
    fn test_sort_parses() {
        assert_eq!("Phone".parse::<MemberSort>().unwrap(), MemberSort::Phone);
        assert!("age".parse::<MemberSort>().is_err());
    }
}
