//! Add/edit form for a member and its position assignments
//!
//! Position edits are staged in memory and only reconciled against the
//! persisted `member_positions` rows when the form is saved. Saving writes
//! the member row and the assignment diff in a single transaction.
//!
//! At most one staged position is primary at any time. Removing the primary
//! position does not promote another one, and neither does saving: a member
//! may legitimately end up with no primary position.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::core::db::{AssignmentRepository, Database, MemberRepository};
use crate::core::error::{StoreError, StoreResult};
use crate::entities::member::normalize_phone;
use crate::entities::{AssignedPosition, Department, MemberDraft, MemberPosition, Position, Region};

/// Result of staging a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPosition {
    Added,
    /// Already staged; nothing changed
    AlreadyAssigned,
    /// No such position; nothing changed
    UnknownPosition,
}

/// Writes needed to turn the persisted assignments into the staged ones
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Position ids whose rows are removed
    pub deletes: Vec<i64>,
    /// (position id, new primary flag) for rows whose flag changes
    pub updates: Vec<(i64, bool)>,
    /// (position id, primary flag) for new rows
    pub inserts: Vec<(i64, bool)>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Diff persisted assignment rows against the staged list
///
/// Unchanged rows produce no write.
pub fn plan_reconciliation(
    persisted: &[MemberPosition],
    staged: &[AssignedPosition],
) -> ReconciliationPlan {
    let persisted_by_position: HashMap<i64, bool> = persisted
        .iter()
        .map(|row| (row.position_id, row.is_primary))
        .collect();
    let staged_ids: HashSet<i64> = staged.iter().map(|s| s.position_id).collect();

    let mut plan = ReconciliationPlan::default();

    for row in persisted {
        if !staged_ids.contains(&row.position_id) {
            plan.deletes.push(row.position_id);
        }
    }

    for record in staged {
        match persisted_by_position.get(&record.position_id) {
            Some(&was_primary) if was_primary == record.is_primary => {}
            Some(_) => plan.updates.push((record.position_id, record.is_primary)),
            None => plan.inserts.push((record.position_id, record.is_primary)),
        }
    }

    plan
}

/// Apply a plan to one member's rows on `conn` (normally an open transaction)
pub fn apply_reconciliation(
    conn: &Connection,
    member_id: i64,
    plan: &ReconciliationPlan,
) -> StoreResult<()> {
    let repo = AssignmentRepository::new(conn);
    for &position_id in &plan.deletes {
        repo.delete(member_id, position_id)?;
    }
    for &(position_id, is_primary) in &plan.updates {
        repo.update_primary(member_id, position_id, is_primary)?;
    }
    for &(position_id, is_primary) in &plan.inserts {
        repo.insert(&MemberPosition {
            member_id,
            position_id,
            is_primary,
        })?;
    }
    Ok(())
}

pub struct MemberForm<'db> {
    db: &'db mut Database,
    member_id: Option<i64>,
    pub draft: MemberDraft,
    staged: Vec<AssignedPosition>,
}

impl<'db> MemberForm<'db> {
    /// Empty form for a new member
    pub fn add(db: &'db mut Database) -> Self {
        Self {
            db,
            member_id: None,
            draft: MemberDraft::default(),
            staged: Vec::new(),
        }
    }

    /// Form loaded with a member and its persisted assignments
    pub fn edit(db: &'db mut Database, member_id: i64) -> StoreResult<Self> {
        let member = db.members().require(member_id)?;
        let staged = db.assignments().for_member(member_id)?;
        Ok(Self {
            draft: member.to_draft(),
            member_id: Some(member_id),
            staged,
            db,
        })
    }

    pub fn member_id(&self) -> Option<i64> {
        self.member_id
    }

    pub fn staged(&self) -> &[AssignedPosition] {
        &self.staged
    }

    pub fn primary_position(&self) -> Option<&AssignedPosition> {
        self.staged.iter().find(|s| s.is_primary)
    }

    /// Stage a position
    pub fn add_position(&mut self, position_id: i64, is_primary: bool) -> StoreResult<AddPosition> {
        if self.staged.iter().any(|s| s.position_id == position_id) {
            return Ok(AddPosition::AlreadyAssigned);
        }
        let Some(position) = self.db.positions().get(position_id)? else {
            debug!("position {} not found, nothing staged", position_id);
            return Ok(AddPosition::UnknownPosition);
        };

        if is_primary {
            for record in &mut self.staged {
                record.is_primary = false;
            }
        }
        self.staged.push(AssignedPosition {
            position_id,
            name: position.name,
            is_primary,
        });
        Ok(AddPosition::Added)
    }

    /// Unstage a position; returns false if it was not staged
    pub fn remove_position(&mut self, position_id: i64) -> bool {
        let before = self.staged.len();
        self.staged.retain(|s| s.position_id != position_id);
        self.staged.len() != before
    }

    /// Make `position_id` the only primary position
    ///
    /// An unstaged id leaves no primary position at all.
    pub fn set_primary_position(&mut self, position_id: i64) {
        for record in &mut self.staged {
            record.is_primary = record.position_id == position_id;
        }
    }

    pub fn regions(&self) -> StoreResult<Vec<Region>> {
        self.db.regions().all()
    }

    pub fn departments(&self) -> StoreResult<Vec<Department>> {
        self.db.departments().all()
    }

    pub fn positions(&self) -> StoreResult<Vec<Position>> {
        self.db.positions().all_sorted()
    }

    /// Positions not yet staged, for the "add position" picker
    pub fn available_positions(&self) -> StoreResult<Vec<Position>> {
        let staged: HashSet<i64> = self.staged.iter().map(|s| s.position_id).collect();
        Ok(self
            .positions()?
            .into_iter()
            .filter(|p| !staged.contains(&p.id))
            .collect())
    }

    /// Save the member row and reconcile its assignments in one transaction
    pub fn save(&mut self) -> StoreResult<i64> {
        let name = self.draft.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation("name", "member name cannot be empty"));
        }
        let draft = MemberDraft {
            name,
            phone_number: normalize_phone(self.draft.phone_number.as_deref()),
            ..self.draft.clone()
        };

        let existing = self.member_id;
        let staged = &self.staged;
        let result = (|| -> StoreResult<(i64, ReconciliationPlan)> {
            let tx = self.db.transaction()?;
            let members = MemberRepository::new(&tx);
            let member_id = match existing {
                Some(id) => {
                    members.update(id, &draft)?;
                    id
                }
                None => members.insert(&draft)?,
            };

            let persisted = AssignmentRepository::new(&tx).rows_for_member(member_id)?;
            let plan = plan_reconciliation(&persisted, staged);
            apply_reconciliation(&tx, member_id, &plan)?;

            tx.commit()?;
            Ok((member_id, plan))
        })();

        match result {
            Ok((member_id, plan)) => {
                info!(
                    "saved member {} '{}' (+{} ~{} -{} position rows)",
                    member_id,
                    draft.name,
                    plan.inserts.len(),
                    plan.updates.len(),
                    plan.deletes.len()
                );
                self.member_id = Some(member_id);
                self.draft = draft;
                Ok(member_id)
            }
            Err(StoreError::Storage(e)) => {
                warn!("member save rolled back: {}", e);
                Err(StoreError::SaveFailed { source: e })
            }
            Err(e) => {
                debug!("member save rolled back: {}", e);
                Err(e)
            }
        }
    }
}
