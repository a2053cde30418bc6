//! Database schema migrations
//!
//! Versioned, forward-only schema steps tracked in the `schema_version`
//! table. Each step runs in its own transaction together with its version
//! row, and checks the live schema first so it is safe on databases that
//! were already partially upgraded by hand.
//!
//! SQLite cannot add a foreign key or drop a table constraint in place, so
//! those steps rebuild the table: create `X_new`, copy rows, drop `X`, rename.
//! Foreign key enforcement is switched off for the duration and checked
//! afterwards.
//!
//! Never modify an existing step; append a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{params, Connection, Transaction};
use tracing::{info, warn};

use crate::core::error::StoreResult;

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 6;

/// Schema version of an open database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current: i32,
    pub target: i32,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.current >= self.target
    }

    pub fn pending(&self) -> i32 {
        (self.target - self.current).max(0)
    }
}

type Step = fn(&Transaction<'_>) -> rusqlite::Result<()>;

const STEPS: [(i32, &str, Step); 6] = [
    (1, "base tables", migrate_v1),
    (2, "region hierarchy", migrate_v2),
    (3, "unique member phone numbers", migrate_v3),
    (4, "region names unique among siblings", migrate_v4),
    (5, "position hierarchy and rank", migrate_v5),
    (6, "departments", migrate_v6),
];

pub(super) fn schema_status(conn: &Connection) -> StoreResult<SchemaStatus> {
    Ok(SchemaStatus {
        current: get_schema_version(conn)?,
        target: CURRENT_SCHEMA_VERSION,
    })
}

/// Get current schema version, 0 if the tracking table does not exist
fn get_schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    if !table_exists(conn, "schema_version")? {
        return Ok(0);
    }

    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Run all pending migrations, returning how many were applied
pub(super) fn run_migrations(conn: &mut Connection) -> StoreResult<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);",
    )?;

    let current = get_schema_version(conn)?;
    if current == CURRENT_SCHEMA_VERSION {
        return Ok(0);
    }
    if current > CURRENT_SCHEMA_VERSION {
        warn!(
            "database schema version ({}) is newer than this build ({}), leaving it untouched",
            current, CURRENT_SCHEMA_VERSION
        );
        return Ok(0);
    }

    info!(
        "running database migrations: v{} -> v{}",
        current, CURRENT_SCHEMA_VERSION
    );

    // Table rebuilds drop tables other tables point at
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    let result = apply_steps(conn, current);
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let applied = result?;

    let violations: i64 =
        conn.query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| {
            row.get(0)
        })?;
    if violations > 0 {
        warn!("{} foreign key violation(s) remain after migration", violations);
    }

    info!("all migrations completed");
    Ok(applied)
}

fn apply_steps(conn: &mut Connection, current: i32) -> StoreResult<usize> {
    let mut applied = 0;
    for (version, description, step) in STEPS {
        if version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        step(&tx)?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![version],
        )?;
        tx.commit()?;
        info!("✓ migration v{} completed: {}", version, description);
        applied += 1;
    }
    Ok(applied)
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

fn index_exists(conn: &Connection, index: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        params![index],
        |row| row.get(0),
    )
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
        params![table, column],
        |row| row.get(0),
    )
}

/// Migration v1: the original flat tables
fn migrate_v1(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS positions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            phone_number TEXT,
            is_schedulable INTEGER NOT NULL DEFAULT 1,
            region_id INTEGER REFERENCES regions(id)
        );
        CREATE INDEX IF NOT EXISTS ix_members_name ON members(name);

        CREATE TABLE IF NOT EXISTS member_positions (
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            position_id INTEGER NOT NULL REFERENCES positions(id),
            is_primary INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (member_id, position_id)
        );
        "#,
    )
}

/// Migration v2: self-referential `regions.parent_id`
fn migrate_v2(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    if column_exists(tx, "regions", "parent_id")? {
        info!("regions.parent_id already present, skipping rebuild");
        return Ok(());
    }

    tx.execute_batch(
        r#"
        CREATE TABLE regions_new (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            parent_id INTEGER REFERENCES regions(id) ON DELETE CASCADE
        );
        INSERT INTO regions_new (id, name) SELECT id, name FROM regions;
        DROP TABLE regions;
        ALTER TABLE regions_new RENAME TO regions;
        "#,
    )
}

/// Migration v3: unique phone numbers (blank phones become NULL first)
fn migrate_v3(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        UPDATE members SET phone_number = NULL WHERE TRIM(phone_number) = '';
        UPDATE members SET phone_number = TRIM(phone_number) WHERE phone_number IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS ix_members_phone_number ON members(phone_number);
        "#,
    )
}

/// Migration v4: region names unique per parent instead of globally
fn migrate_v4(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    if index_exists(tx, "ux_regions_root_name")? {
        return Ok(());
    }

    tx.execute_batch(
        r#"
        CREATE TABLE regions_new (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES regions(id) ON DELETE CASCADE,
            CONSTRAINT uq_regions_parent_name UNIQUE (parent_id, name)
        );
        INSERT INTO regions_new (id, name, parent_id) SELECT id, name, parent_id FROM regions;
        DROP TABLE regions;
        ALTER TABLE regions_new RENAME TO regions;

        CREATE UNIQUE INDEX ux_regions_root_name ON regions(name) WHERE parent_id IS NULL;
        CREATE INDEX IF NOT EXISTS ix_regions_parent ON regions(parent_id);
        "#,
    )
}

/// Migration v5: position tree with sibling rank; drops the global name uniqueness
fn migrate_v5(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    if column_exists(tx, "positions", "rank")? {
        return Ok(());
    }

    let has_parent = column_exists(tx, "positions", "parent_id")?;
    let parent_expr = if has_parent { "parent_id" } else { "NULL" };

    tx.execute_batch(&format!(
        r#"
        CREATE TABLE positions_new (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES positions(id) ON DELETE CASCADE,
            rank INTEGER NOT NULL DEFAULT 0,
            CONSTRAINT uq_positions_parent_name UNIQUE (parent_id, name)
        );
        INSERT INTO positions_new (id, name, parent_id, rank)
            SELECT p.id, p.name, {parent},
                   (SELECT COUNT(*) FROM positions q WHERE q.id < p.id)
            FROM positions p;
        DROP TABLE positions;
        ALTER TABLE positions_new RENAME TO positions;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_positions_root_name ON positions(name) WHERE parent_id IS NULL;
        CREATE INDEX IF NOT EXISTS ix_positions_parent ON positions(parent_id, rank);
        "#,
        parent = parent_expr
    ))
}

/// Migration v6: departments and `members.department_id`
fn migrate_v6(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );
        "#,
    )?;

    if !column_exists(tx, "members", "department_id")? {
        tx.execute_batch(
            "ALTER TABLE members ADD COLUMN department_id INTEGER REFERENCES departments(id);",
        )?;
    }
    Ok(())
}
