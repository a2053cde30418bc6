//! Departments: a flat list members can optionally belong to

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::core::error::{violates_unique, StoreError, StoreResult};
use crate::entities::Department;

const KIND: &str = "department";

pub struct DepartmentRepository<'c> {
    conn: &'c Connection,
}

impl<'c> DepartmentRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn all(&self) -> StoreResult<Vec<Department>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM departments ORDER BY name COLLATE NOCASE, id")?;
        let rows = stmt.query_map([], Department::from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn get(&self, id: i64) -> StoreResult<Option<Department>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM departments WHERE id = ?1",
                params![id],
                Department::from_row,
            )
            .optional()?)
    }

    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<Department>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM departments WHERE name = ?1",
                params![name],
                Department::from_row,
            )
            .optional()?)
    }

    pub fn add(&self, name: &str) -> StoreResult<i64> {
        let name = validated_name(name)?;
        self.conn
            .execute("INSERT INTO departments (name) VALUES (?1)", params![name])
            .map_err(|e| classify(e, name))?;
        let id = self.conn.last_insert_rowid();
        info!("added department {} '{}'", id, name);
        Ok(id)
    }

    pub fn rename(&self, id: i64, name: &str) -> StoreResult<()> {
        let name = validated_name(name)?;
        let changed = self
            .conn
            .execute(
                "UPDATE departments SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .map_err(|e| classify(e, name))?;
        if changed == 0 {
            return Err(StoreError::not_found(KIND, id));
        }
        Ok(())
    }

    /// Delete a department no member belongs to
    pub fn delete(&self, id: i64) -> StoreResult<()> {
        if self.get(id)?.is_none() {
            return Err(StoreError::not_found(KIND, id));
        }

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM members WHERE department_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if count > 0 {
            return Err(StoreError::HasDependents {
                kind: KIND,
                id,
                count,
                dependents: "member(s)",
            });
        }

        self.conn
            .execute("DELETE FROM departments WHERE id = ?1", params![id])?;
        info!("deleted department {}", id);
        Ok(())
    }
}

fn validated_name(name: &str) -> StoreResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation("name", "department name cannot be empty"));
    }
    Ok(name)
}

fn classify(err: rusqlite::Error, name: &str) -> StoreError {
    if violates_unique(&err, "departments", "name") {
        return StoreError::DuplicateName {
            kind: KIND,
            name: name.to_string(),
        };
    }
    StoreError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::fixtures;

    #[test]
    fn test_add_rename_delete() {
        let db = fixtures::db();
        let repo = db.departments();

        let id = repo.add("  Ops ").unwrap();
        assert_eq!(repo.get(id).unwrap().unwrap().name, "Ops");

        repo.rename(id, "Operations").unwrap();
        assert!(repo.find_by_name("Operations").unwrap().is_some());

        repo.delete(id).unwrap();
        assert!(repo.all().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_and_blank_names() {
        let db = fixtures::db();
        let repo = db.departments();
        repo.add("Ops").unwrap();

        assert!(matches!(repo.add("Ops"), Err(StoreError::DuplicateName { .. })));
        assert!(matches!(repo.add("  "), Err(StoreError::Validation { .. })));
    }

    #[test]
    fn test_delete_blocked_while_members_reference_it() {
        let db = fixtures::db();
        let dept = db.departments().add("Ops").unwrap();
        let m = fixtures::member(&db, "Ann", None);
        db.conn()
            .execute(
                "UPDATE members SET department_id = ?1 WHERE id = ?2",
                params![dept, m],
            )
            .unwrap();

        let err = db.departments().delete(dept).unwrap_err();
        assert!(matches!(err, StoreError::HasDependents { count: 1, .. }));
        assert_eq!(db.departments().all().unwrap().len(), 1);
    }
}
