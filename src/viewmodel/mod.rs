//! Dialog-facing state: staged edits, validation and save orchestration
//!
//! Each form borrows the storage session it works on; nothing here holds a
//! connection of its own except the background import worker.

pub mod import;
pub mod member_form;
pub mod tree_form;

pub use import::{
    preview, read_rows, ImportError, ImportEvent, ImportRow, ImportSummary, ImportWorker,
    MemberImporter, RowResult, RowStatus, TEMPLATE_HEADERS,
};
pub use member_form::{
    apply_reconciliation, plan_reconciliation, AddPosition, MemberForm, ReconciliationPlan,
};
pub use tree_form::{FormMode, PositionForm, RegionForm, TreeNodeForm};
