//! Member ↔ position association rows
//!
//! These rows are only ever written as part of a member save or an import
//! row, so every method runs on the connection (or open transaction) the
//! repository was built over and never starts a transaction of its own.

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::error::StoreResult;
use crate::entities::{AssignedPosition, MemberPosition};

pub struct AssignmentRepository<'c> {
    conn: &'c Connection,
}

impl<'c> AssignmentRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// A member's assignments with position names, primary first
    pub fn for_member(&self, member_id: i64) -> StoreResult<Vec<AssignedPosition>> {
        let mut stmt = self.conn.prepare(
            "SELECT mp.position_id, p.name, mp.is_primary
               FROM member_positions mp
               JOIN positions p ON p.id = mp.position_id
              WHERE mp.member_id = ?1
              ORDER BY mp.is_primary DESC, p.rank, p.id",
        )?;
        let rows = stmt.query_map(params![member_id], |row| {
            Ok(AssignedPosition {
                position_id: row.get(0)?,
                name: row.get(1)?,
                is_primary: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Raw persisted rows for a member
    pub fn rows_for_member(&self, member_id: i64) -> StoreResult<Vec<MemberPosition>> {
        let mut stmt = self.conn.prepare(
            "SELECT member_id, position_id, is_primary FROM member_positions
              WHERE member_id = ?1 ORDER BY position_id",
        )?;
        let rows = stmt.query_map(params![member_id], |row| {
            Ok(MemberPosition {
                member_id: row.get(0)?,
                position_id: row.get(1)?,
                is_primary: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn find(&self, member_id: i64, position_id: i64) -> StoreResult<Option<MemberPosition>> {
        Ok(self
            .conn
            .query_row(
                "SELECT member_id, position_id, is_primary FROM member_positions
                  WHERE member_id = ?1 AND position_id = ?2",
                params![member_id, position_id],
                |row| {
                    Ok(MemberPosition {
                        member_id: row.get(0)?,
                        position_id: row.get(1)?,
                        is_primary: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Number of primary-flagged rows for a member
    pub fn primary_count(&self, member_id: i64) -> StoreResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM member_positions WHERE member_id = ?1 AND is_primary = 1",
            params![member_id],
            |row| row.get(0),
        )?)
    }

    pub fn has_primary(&self, member_id: i64) -> StoreResult<bool> {
        Ok(self.primary_count(member_id)? > 0)
    }

    pub fn insert(&self, row: &MemberPosition) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO member_positions (member_id, position_id, is_primary) VALUES (?1, ?2, ?3)",
            params![row.member_id, row.position_id, row.is_primary],
        )?;
        Ok(())
    }

    pub fn update_primary(&self, member_id: i64, position_id: i64, is_primary: bool) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "UPDATE member_positions SET is_primary = ?1 WHERE member_id = ?2 AND position_id = ?3",
            params![is_primary, member_id, position_id],
        )?)
    }

    pub fn delete(&self, member_id: i64, position_id: i64) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM member_positions WHERE member_id = ?1 AND position_id = ?2",
            params![member_id, position_id],
        )?)
    }
}
