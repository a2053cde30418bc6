//! SQLite-backed roster store
//!
//! This module provides the single storage session the application works
//! through:
//! - [`Database`] owns one connection with foreign keys enforced
//! - opening a database applies any pending schema migrations
//! - repositories borrow the connection (or an open transaction) explicitly
//!
//! There is no global connection. Every component receives the session it
//! operates on, and a background import opens its own.

mod migrations;

pub mod assignments;
pub mod departments;
pub mod members;
pub mod tree;

pub use assignments::AssignmentRepository;
pub use departments::DepartmentRepository;
pub use members::{MemberFilter, MemberRepository, MemberSort, MemberSummary};
pub use migrations::{SchemaStatus, CURRENT_SCHEMA_VERSION};
pub use tree::{build_forest, HierarchyEntry, PositionRepository, RegionRepository, TreeItem, TreeRepository};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::core::error::StoreResult;

/// How long a writer waits for another connection's lock (import worker vs CLI)
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The storage session
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database file and migrate it
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut db = Self::open_unmigrated(path)?;
        // Journal mode reports the resulting mode as a row
        let _mode: String = db
            .conn
            .query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the current schema
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn, path: None };
        db.configure()?;
        db.migrate()?;
        Ok(db)
    }

    /// Open without running migrations or changing the journal mode
    pub fn open_unmigrated(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        db.configure()?;
        Ok(db)
    }

    fn configure(&self) -> StoreResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Apply pending migrations, returning how many ran
    pub fn migrate(&mut self) -> StoreResult<usize> {
        migrations::run_migrations(&mut self.conn)
    }

    /// Current and target schema version
    pub fn schema_status(&self) -> StoreResult<SchemaStatus> {
        migrations::schema_status(&self.conn)
    }

    /// Path of the backing file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the connection for read queries
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction; dropping it without commit rolls back
    pub fn transaction(&mut self) -> StoreResult<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    pub fn regions(&self) -> RegionRepository<'_> {
        RegionRepository::new(&self.conn)
    }

    pub fn positions(&self) -> PositionRepository<'_> {
        PositionRepository::new(&self.conn)
    }

    pub fn members(&self) -> MemberRepository<'_> {
        MemberRepository::new(&self.conn)
    }

    pub fn assignments(&self) -> AssignmentRepository<'_> {
        AssignmentRepository::new(&self.conn)
    }

    pub fn departments(&self) -> DepartmentRepository<'_> {
        DepartmentRepository::new(&self.conn)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared builders for storage tests

    use super::*;
    use crate::entities::{Position, Region, TreeNode};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn region(db: &Database, name: &str, parent: Option<i64>) -> i64 {
        Region::insert(db.conn(), name, parent).unwrap()
    }

    pub fn position(db: &Database, name: &str, parent: Option<i64>) -> i64 {
        Position::insert(db.conn(), name, parent).unwrap()
    }

    pub fn member(db: &Database, name: &str, phone: Option<&str>) -> i64 {
        db.conn()
            .execute(
                "INSERT INTO members (name, phone_number, is_schedulable) VALUES (?1, ?2, 1)",
                rusqlite::params![name, phone],
            )
            .unwrap();
        db.conn().last_insert_rowid()
    }

    pub fn assign(db: &Database, member_id: i64, position_id: i64, primary: bool) {
        db.conn()
            .execute(
                "INSERT INTO member_positions (member_id, position_id, is_primary) VALUES (?1, ?2, ?3)",
                rusqlite::params![member_id, position_id, primary],
            )
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_file_and_schema() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested/roster.db");
        let db = Database::open(&path).unwrap();

        assert!(path.exists());
        let status = db.schema_status().unwrap();
        assert_eq!(status.current, CURRENT_SCHEMA_VERSION);
        assert!(status.is_current());
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("roster.db");
        drop(Database::open(&path).unwrap());

        let mut db = Database::open(&path).unwrap();
        assert_eq!(db.migrate().unwrap(), 0);
    }

    fn journal_mode(db: &Database) -> String {
        db.conn()
            .query_row("PRAGMA journal_mode;", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_unmigrated_open_leaves_journal_mode_alone() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("plain.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE notes (body TEXT);")
            .unwrap();

        let db = Database::open_unmigrated(&path).unwrap();
        assert_eq!(db.schema_status().unwrap().current, 0);
        assert_eq!(journal_mode(&db), "delete");
        drop(db);

        let db = Database::open(&path).unwrap();
        assert_eq!(journal_mode(&db), "wal");
    }

    #[test]
    fn test_unmigrated_open_creates_parent_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a/b/roster.db");

        let mut db = Database::open_unmigrated(&path).unwrap();
        assert_eq!(db.migrate().unwrap(), CURRENT_SCHEMA_VERSION as usize);
        assert!(db.schema_status().unwrap().is_current());
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = fixtures::db();
        let err = db
            .conn()
            .execute(
                "INSERT INTO member_positions (member_id, position_id, is_primary) VALUES (99, 99, 0)",
                [],
            )
            .unwrap_err();
        assert!(err.to_string().contains("FOREIGN KEY"));
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut db = fixtures::db();
        {
            let tx = db.transaction().unwrap();
            tx.execute("INSERT INTO departments (name) VALUES ('Ops')", [])
                .unwrap();
        }
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM departments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
