//! Add/edit form for a region or position
//!
//! The form holds scratch copies of the name and parent. Nothing reaches
//! storage until [`TreeNodeForm::save`], which writes inside one transaction.
//! Parent candidates come from [`TreeNodeForm::possible_parents`]; `save`
//! itself does not re-check the chosen parent for cycles, so callers that
//! accept a parent from anywhere else must validate it against that list.

use tracing::{debug, info, warn};

use crate::core::db::{Database, TreeRepository};
use crate::core::error::{violates_unique, StoreError, StoreResult};
use crate::entities::{Position, Region, TreeNode};

pub type RegionForm<'db> = TreeNodeForm<'db, Region>;
pub type PositionForm<'db> = TreeNodeForm<'db, Position>;

/// Whether the form creates a node or edits an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(i64),
}

pub struct TreeNodeForm<'db, N: TreeNode> {
    db: &'db mut Database,
    original: Option<N>,
    pub name: String,
    pub parent_id: Option<i64>,
}

impl<'db, N: TreeNode> TreeNodeForm<'db, N> {
    /// Form for a new node, optionally pre-selecting its parent
    pub fn add(db: &'db mut Database, parent_id: Option<i64>) -> Self {
        Self {
            db,
            original: None,
            name: String::new(),
            parent_id,
        }
    }

    /// Form loaded with an existing node
    pub fn edit(db: &'db mut Database, id: i64) -> StoreResult<Self> {
        let node = TreeRepository::<N>::new(db.conn()).require(id)?;
        Ok(Self {
            name: node.name().to_string(),
            parent_id: node.parent_id(),
            original: Some(node),
            db,
        })
    }

    pub fn mode(&self) -> FormMode {
        match &self.original {
            Some(node) => FormMode::Edit(node.id()),
            None => FormMode::Add,
        }
    }

    /// Candidates for the parent field
    pub fn possible_parents(&self) -> StoreResult<Vec<N>> {
        let id = self.original.as_ref().map(|n| n.id());
        TreeRepository::<N>::new(self.db.conn()).get_possible_parents(id)
    }

    /// True if `candidate` is one of [`Self::possible_parents`]
    pub fn is_valid_parent(&self, candidate: i64) -> StoreResult<bool> {
        let id = self.original.as_ref().map(|n| n.id());
        TreeRepository::<N>::new(self.db.conn()).is_valid_parent(id, candidate)
    }

    /// Write the scratch fields, returning the node id
    pub fn save(&mut self) -> StoreResult<i64> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation(
                "name",
                format!("{} name cannot be empty", N::KIND),
            ));
        }

        let mode = self.mode();
        let parent_id = self.parent_id;
        let result = (|| -> StoreResult<i64> {
            let tx = self.db.transaction()?;
            let id = match mode {
                FormMode::Edit(id) => {
                    N::update(&tx, id, &name, parent_id)?;
                    id
                }
                FormMode::Add => N::insert(&tx, &name, parent_id)?,
            };
            tx.commit()?;
            Ok(id)
        })();

        match result {
            Ok(id) => {
                info!("saved {} {} '{}'", N::KIND, id, name);
                self.name = name;
                self.original = TreeRepository::<N>::new(self.db.conn()).get(id)?;
                Ok(id)
            }
            Err(StoreError::Storage(e)) if violates_unique(&e, N::TABLE, "name") => {
                debug!("{} save rolled back: {}", N::KIND, e);
                Err(StoreError::DuplicateName { kind: N::KIND, name })
            }
            Err(StoreError::Storage(e)) => {
                warn!("{} save rolled back: {}", N::KIND, e);
                Err(StoreError::SaveFailed { source: e })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::fixtures;

    #[test]
    fn test_add_region() {
        let mut db = fixtures::db();
        let north = fixtures::region(&db, "North", None);

        let mut form = RegionForm::add(&mut db, Some(north));
        form.name = "  East ".into();
        let id = form.save().unwrap();
        assert_eq!(form.mode(), FormMode::Edit(id));

        let east = db.regions().require(id).unwrap();
        assert_eq!(east.name, "East");
        assert_eq!(east.parent_id, Some(north));
    }

    #[test]
    fn test_blank_name_never_touches_storage() {
        let mut db = fixtures::db();
        let mut form = RegionForm::add(&mut db, None);
        form.name = "   ".into();

        assert!(matches!(form.save(), Err(StoreError::Validation { field: "name", .. })));
        assert!(db.regions().all().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_sibling_name() {
        let mut db = fixtures::db();
        let north = fixtures::region(&db, "North", None);
        fixtures::region(&db, "East", Some(north));

        let mut form = RegionForm::add(&mut db, Some(north));
        form.name = "East".into();
        let err = form.save().unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName { ref name, .. } if name == "East"));
    }

    #[test]
    fn test_duplicate_root_name() {
        let mut db = fixtures::db();
        fixtures::region(&db, "North", None);

        let mut form = RegionForm::add(&mut db, None);
        form.name = "North".into();
        assert!(matches!(form.save(), Err(StoreError::DuplicateName { .. })));
    }

    #[test]
    fn test_same_name_under_another_parent_is_fine() {
        let mut db = fixtures::db();
        let north = fixtures::region(&db, "North", None);
        let south = fixtures::region(&db, "South", None);
        fixtures::region(&db, "Central", Some(north));

        let mut form = RegionForm::add(&mut db, Some(south));
        form.name = "Central".into();
        assert!(form.save().is_ok());
    }

    #[test]
    fn test_edit_reparents_and_renames() {
        let mut db = fixtures::db();
        let a = fixtures::region(&db, "A", None);
        let b = fixtures::region(&db, "B", None);

        let mut form = RegionForm::edit(&mut db, b).unwrap();
        assert_eq!(form.name, "B");
        form.name = "B2".into();
        form.parent_id = Some(a);
        form.save().unwrap();

        let b = db.regions().require(b).unwrap();
        assert_eq!(b.name, "B2");
        assert_eq!(b.parent_id, Some(a));
    }

    #[test]
    fn test_edit_possible_parents_excludes_subtree() {
        let mut db = fixtures::db();
        let a = fixtures::region(&db, "A", None);
        let b = fixtures::region(&db, "B", Some(a));
        fixtures::region(&db, "C", Some(b));

        let form = RegionForm::edit(&mut db, b).unwrap();
        let parents: Vec<i64> = form.possible_parents().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(parents, vec![a]);
    }

    #[test]
    fn test_is_valid_parent_rejects_own_subtree() {
        let mut db = fixtures::db();
        let a = fixtures::region(&db, "A", None);
        let b = fixtures::region(&db, "B", Some(a));
        let c = fixtures::region(&db, "C", Some(b));
        let d = fixtures::region(&db, "D", None);

        let form = RegionForm::edit(&mut db, a).unwrap();
        assert!(!form.is_valid_parent(a).unwrap());
        assert!(!form.is_valid_parent(b).unwrap());
        assert!(!form.is_valid_parent(c).unwrap());
        assert!(form.is_valid_parent(d).unwrap());

        let form = RegionForm::add(&mut db, None);
        assert!(form.is_valid_parent(c).unwrap());
    }

    #[test]
    fn test_failed_edit_rolls_back() {
        let mut db = fixtures::db();
        fixtures::region(&db, "A", None);
        let b = fixtures::region(&db, "B", None);

        let mut form = RegionForm::edit(&mut db, b).unwrap();
        form.name = "A".into();
        assert!(form.save().is_err());
        assert_eq!(db.regions().require(b).unwrap().name, "B");
    }

    #[test]
    fn test_missing_parent_is_save_failure() {
        let mut db = fixtures::db();
        let mut form = PositionForm::add(&mut db, Some(999));
        form.name = "Orphan".into();
        assert!(matches!(form.save(), Err(StoreError::SaveFailed { .. })));
    }

    #[test]
    fn test_position_reparent_appends_rank() {
        let mut db = fixtures::db();
        let root = fixtures::position(&db, "Root", None);
        fixtures::position(&db, "First", Some(root));
        let loose = fixtures::position(&db, "Loose", None);

        let mut form = PositionForm::edit(&mut db, loose).unwrap();
        form.parent_id = Some(root);
        form.save().unwrap();

        let loose = db.positions().require(loose).unwrap();
        assert_eq!(loose.parent_id, Some(root));
        assert_eq!(loose.rank, 1);
    }
}
