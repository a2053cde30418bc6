//! Member ↔ position association

use serde::{Deserialize, Serialize};

/// One persisted `member_positions` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPosition {
    pub member_id: i64,
    pub position_id: i64,
    pub is_primary: bool,
}

/// A position assigned to a member, with the position name denormalized for
/// display. Used both for persisted assignments and for staged edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPosition {
    pub position_id: i64,
    pub name: String,
    pub is_primary: bool,
}
