//! Structural queries over the self-referential region and position tables
//!
//! One generic repository serves both trees. The interesting operation is
//! [`TreeRepository::get_possible_parents`]: every node except the node being
//! edited and its whole subtree, which is exactly the set of parents that
//! cannot create a cycle.

use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::error::{StoreError, StoreResult};
use crate::entities::{Position, Region, TreeNode};

pub type RegionRepository<'c> = TreeRepository<'c, Region>;
pub type PositionRepository<'c> = TreeRepository<'c, Position>;

/// Read/delete access to one tree table
pub struct TreeRepository<'c, N: TreeNode> {
    conn: &'c Connection,
    _node: PhantomData<N>,
}

impl<'c, N: TreeNode> TreeRepository<'c, N> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            _node: PhantomData,
        }
    }

    fn select(&self, clause: &str) -> String {
        format!("SELECT {} FROM {} {}", N::COLUMNS, N::TABLE, clause)
    }

    pub fn get(&self, id: i64) -> StoreResult<Option<N>> {
        let sql = self.select("WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], |row| N::from_row(row))
            .optional()?)
    }

    /// Like [`get`](Self::get) but a missing node is an error
    pub fn require(&self, id: i64) -> StoreResult<N> {
        self.get(id)?
            .ok_or_else(|| StoreError::not_found(N::KIND, id))
    }

    /// All nodes ordered by name
    pub fn all(&self) -> StoreResult<Vec<N>> {
        let sql = self.select("ORDER BY name COLLATE NOCASE, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| N::from_row(row))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All nodes grouped by parent, siblings in display order
    ///
    /// This is the order [`build_forest`] expects.
    pub fn all_sorted(&self) -> StoreResult<Vec<N>> {
        let sql = self.select(&format!("ORDER BY parent_id, {}", N::SIBLING_ORDER));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| N::from_row(row))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Direct children in display order
    pub fn children_of(&self, id: i64) -> StoreResult<Vec<N>> {
        let sql = self.select(&format!("WHERE parent_id = ?1 ORDER BY {}", N::SIBLING_ORDER));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id], |row| N::from_row(row))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Case-insensitive substring search on name
    pub fn search(&self, term: &str) -> StoreResult<Vec<N>> {
        let sql = self.select("WHERE name LIKE ?1 ORDER BY name COLLATE NOCASE, id");
        let pattern = format!("%{}%", term.trim());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern], |row| N::from_row(row))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Look a node up by exact name under `parent_id`
    pub fn find_by_name(&self, name: &str, parent_id: Option<i64>) -> StoreResult<Option<N>> {
        let sql = self.select("WHERE name = ?1 AND parent_id IS ?2");
        Ok(self
            .conn
            .query_row(&sql, params![name, parent_id], |row| N::from_row(row))
            .optional()?)
    }

    /// A node together with its direct children
    pub fn get_by_id_with_children(&self, id: i64) -> StoreResult<Option<TreeItem<N>>> {
        let Some(node) = self.get(id)? else {
            return Ok(None);
        };
        let children = self
            .children_of(id)?
            .into_iter()
            .map(TreeItem::leaf)
            .collect();
        Ok(Some(TreeItem { node, children }))
    }

    fn child_ids(&self, id: i64) -> rusqlite::Result<Vec<i64>> {
        let sql = format!("SELECT id FROM {} WHERE parent_id = ?1", N::TABLE);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;
        rows.collect()
    }

    /// Every transitive descendant of `id`, not including `id` itself
    ///
    /// Breadth-first over a work queue. The visited set means a malformed
    /// table that already contains a cycle still terminates.
    pub fn descendant_ids(&self, id: i64) -> StoreResult<HashSet<i64>> {
        let mut descendants = HashSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for child in self.child_ids(current)? {
                if child != id && descendants.insert(child) {
                    queue.push_back(child);
                }
            }
        }

        Ok(descendants)
    }

    /// Nodes eligible as parent of `node_id`, or of a new node when `None`
    ///
    /// Excludes the node and all of its descendants, ordered by name.
    pub fn get_possible_parents(&self, node_id: Option<i64>) -> StoreResult<Vec<N>> {
        let Some(node_id) = node_id else {
            return self.all();
        };

        let mut excluded: Vec<i64> = self.descendant_ids(node_id)?.into_iter().collect();
        excluded.push(node_id);
        excluded.sort_unstable();

        let placeholders = vec!["?"; excluded.len()].join(", ");
        let sql = self.select(&format!(
            "WHERE id NOT IN ({}) ORDER BY name COLLATE NOCASE, id",
            placeholders
        ));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(excluded.iter()), |row| N::from_row(row))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// True if `candidate` may become the parent of `node_id`
    pub fn is_valid_parent(&self, node_id: Option<i64>, candidate: i64) -> StoreResult<bool> {
        Ok(self
            .get_possible_parents(node_id)?
            .iter()
            .any(|n| n.id() == candidate))
    }

    /// Ancestor chain from the root down to `id` (inclusive)
    pub fn path(&self, id: i64) -> StoreResult<Vec<N>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id);

        while let Some(current) = next {
            if !seen.insert(current) {
                warn!("{} {} has a cyclic parent chain", N::KIND, id);
                break;
            }
            let Some(node) = self.get(current)? else {
                break;
            };
            next = node.parent_id();
            chain.push(node);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Display path such as `North / East`
    pub fn path_label(&self, id: i64) -> StoreResult<String> {
        Ok(self
            .path(id)?
            .iter()
            .map(|n| n.name())
            .collect::<Vec<_>>()
            .join(" / "))
    }

    /// Delete a leaf node that nothing references
    ///
    /// Children and dependents are found by explicit count queries up front;
    /// the cascading foreign key is never relied on.
    pub fn delete(&self, id: i64) -> StoreResult<()> {
        let Some(item) = self.get_by_id_with_children(id)? else {
            return Err(StoreError::not_found(N::KIND, id));
        };

        if !item.children.is_empty() {
            info!(
                "refusing to delete {} {}: {} child(ren)",
                N::KIND,
                id,
                item.children.len()
            );
            return Err(StoreError::HasChildren { kind: N::KIND, id });
        }

        let count: i64 = self
            .conn
            .query_row(N::DEPENDENTS_SQL, params![id], |row| row.get(0))?;
        if count > 0 {
            info!("refusing to delete {} {}: {} dependent row(s)", N::KIND, id, count);
            return Err(StoreError::HasDependents {
                kind: N::KIND,
                id,
                count,
                dependents: N::DEPENDENTS_LABEL,
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", N::TABLE),
            params![id],
        )?;
        tx.commit()?;
        info!("deleted {} {} '{}'", N::KIND, id, item.node.name());
        Ok(())
    }
}

/// One (id, parent, rank) triple of a reordered position tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyEntry {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub rank: i64,
}

impl<'c> TreeRepository<'c, Position> {
    /// Apply a reordered hierarchy in one transaction
    ///
    /// Entries whose parent would be the entry itself or one of its own
    /// descendants after the batch are rejected before anything is written.
    pub fn update_hierarchy(&self, entries: &[HierarchyEntry]) -> StoreResult<usize> {
        let mut parents: HashMap<i64, Option<i64>> = self
            .all()?
            .into_iter()
            .map(|p| (p.id, p.parent_id))
            .collect();
        for entry in entries {
            if !parents.contains_key(&entry.id) {
                return Err(StoreError::not_found(Position::KIND, entry.id));
            }
            parents.insert(entry.id, entry.parent_id);
        }
        for entry in entries {
            if forms_cycle(&parents, entry.id) {
                return Err(StoreError::validation(
                    "parent",
                    format!("position {} cannot be placed under its own subtree", entry.id),
                ));
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt =
                tx.prepare("UPDATE positions SET parent_id = ?1, rank = ?2 WHERE id = ?3")?;
            for entry in entries {
                updated += stmt.execute(params![entry.parent_id, entry.rank, entry.id])?;
            }
        }
        tx.commit()?;
        info!("position hierarchy updated ({} row(s))", updated);
        Ok(updated)
    }

    /// Swap a position with the sibling above it; false if already first
    pub fn move_up(&self, id: i64) -> StoreResult<bool> {
        self.shift(id, -1)
    }

    /// Swap a position with the sibling below it; false if already last
    pub fn move_down(&self, id: i64) -> StoreResult<bool> {
        self.shift(id, 1)
    }

    fn shift(&self, id: i64, delta: isize) -> StoreResult<bool> {
        let position = self.require(id)?;
        let sql = self.select(&format!(
            "WHERE parent_id IS ?1 ORDER BY {}",
            Position::SIBLING_ORDER
        ));
        let mut siblings: Vec<i64> = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params![position.parent_id], |row| {
                Position::from_row(row)
            })?;
            rows.map(|r| r.map(|p| p.id)).collect::<Result<_, _>>()?
        };

        let Some(index) = siblings.iter().position(|&s| s == id) else {
            return Err(StoreError::not_found(Position::KIND, id));
        };
        let Some(target) = index.checked_add_signed(delta).filter(|&t| t < siblings.len())
        else {
            debug!("position {} is already at the edge of its siblings", id);
            return Ok(false);
        };
        siblings.swap(index, target);

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE positions SET rank = ?1 WHERE id = ?2")?;
            for (rank, sibling) in siblings.iter().enumerate() {
                stmt.execute(params![rank as i64, sibling])?;
            }
        }
        tx.commit()?;
        Ok(true)
    }
}

fn forms_cycle(parents: &HashMap<i64, Option<i64>>, start: i64) -> bool {
    let mut seen = HashSet::from([start]);
    let mut next = parents.get(&start).copied().flatten();
    while let Some(current) = next {
        if !seen.insert(current) {
            return true;
        }
        next = parents.get(&current).copied().flatten();
    }
    false
}

/// A node with its (recursively assembled) children
#[derive(Debug, Clone, Serialize)]
pub struct TreeItem<N> {
    pub node: N,
    pub children: Vec<TreeItem<N>>,
}

impl<N> TreeItem<N> {
    pub fn leaf(node: N) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }
}

/// Assemble a flat node list into a forest
///
/// Sibling order follows the input order, so callers pass nodes already
/// sorted for display. Nodes whose parent is missing from the list become
/// roots; nodes caught in a parent cycle are dropped.
pub fn build_forest<N: TreeNode>(nodes: Vec<N>) -> Vec<TreeItem<N>> {
    let ids: HashSet<i64> = nodes.iter().map(|n| n.id()).collect();
    let mut by_parent: HashMap<Option<i64>, Vec<N>> = HashMap::new();
    for node in nodes {
        let parent = node.parent_id().filter(|p| ids.contains(p));
        by_parent.entry(parent).or_default().push(node);
    }

    fn attach<N: TreeNode>(
        parent: Option<i64>,
        by_parent: &mut HashMap<Option<i64>, Vec<N>>,
    ) -> Vec<TreeItem<N>> {
        let Some(children) = by_parent.remove(&parent) else {
            return Vec::new();
        };
        children
            .into_iter()
            .map(|node| {
                let children = attach(Some(node.id()), by_parent);
                TreeItem { node, children }
            })
            .collect()
    }

    attach(None, &mut by_parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::fixtures;
    use crate::core::db::Database;

    fn ids<N: TreeNode>(nodes: &[N]) -> Vec<i64> {
        let mut ids: Vec<i64> = nodes.iter().map(|n| n.id()).collect();
        ids.sort_unstable();
        ids
    }

    /// A -> B -> C
    fn chain(db: &Database) -> (i64, i64, i64) {
        let a = fixtures::region(db, "A", None);
        let b = fixtures::region(db, "B", Some(a));
        let c = fixtures::region(db, "C", Some(b));
        (a, b, c)
    }

    #[test]
    fn test_possible_parents_of_middle_node_in_chain() {
        let db = fixtures::db();
        let (a, b, _c) = chain(&db);

        let parents = db.regions().get_possible_parents(Some(b)).unwrap();
        assert_eq!(ids(&parents), vec![a]);
    }

    #[test]
    fn test_possible_parents_for_new_node_is_everything() {
        let db = fixtures::db();
        let (a, b, c) = chain(&db);

        let parents = db.regions().get_possible_parents(None).unwrap();
        assert_eq!(ids(&parents), vec![a, b, c]);
    }

    #[test]
    fn test_is_valid_parent_follows_possible_parents() {
        let db = fixtures::db();
        let (a, b, c) = chain(&db);
        let other = fixtures::region(&db, "Other", None);

        let repo = db.regions();
        assert!(!repo.is_valid_parent(Some(a), b).unwrap());
        assert!(!repo.is_valid_parent(Some(a), c).unwrap());
        assert!(!repo.is_valid_parent(Some(a), a).unwrap());
        assert!(repo.is_valid_parent(Some(a), other).unwrap());
        assert!(repo.is_valid_parent(Some(c), a).unwrap());
        assert!(repo.is_valid_parent(None, c).unwrap());
        assert!(!repo.is_valid_parent(None, 999).unwrap());
    }

    #[test]
    fn test_possible_parents_single_node_tree() {
        let db = fixtures::db();
        let only = fixtures::region(&db, "Only", None);

        assert!(db.regions().get_possible_parents(Some(only)).unwrap().is_empty());
        assert_eq!(db.regions().descendant_ids(only).unwrap().len(), 0);
    }

    #[test]
    fn test_possible_parents_balanced_tree_keeps_siblings_and_ancestors() {
        let db = fixtures::db();
        let root = fixtures::region(&db, "Root", None);
        let left = fixtures::region(&db, "Left", Some(root));
        let right = fixtures::region(&db, "Right", Some(root));
        let ll = fixtures::region(&db, "LL", Some(left));
        let lr = fixtures::region(&db, "LR", Some(left));
        let rl = fixtures::region(&db, "RL", Some(right));
        let rr = fixtures::region(&db, "RR", Some(right));

        let repo = db.regions();
        assert_eq!(
            repo.descendant_ids(left).unwrap(),
            HashSet::from([ll, lr])
        );
        assert_eq!(
            ids(&repo.get_possible_parents(Some(left)).unwrap()),
            vec![root, right, rl, rr]
        );
        assert!(repo.get_possible_parents(Some(root)).unwrap().is_empty());
    }

    #[test]
    fn test_possible_parents_never_contain_node_or_descendants() {
        let db = fixtures::db();
        let mut all = vec![fixtures::region(&db, "n0", None)];
        // Irregular tree: parent of n_i is n_(i/2)
        for i in 1..20 {
            let parent = all[i / 2];
            all.push(fixtures::region(&db, &format!("n{}", i), Some(parent)));
        }

        let repo = db.regions();
        for &node in &all {
            let descendants = repo.descendant_ids(node).unwrap();
            let parents = repo.get_possible_parents(Some(node)).unwrap();
            for p in &parents {
                assert_ne!(p.id, node);
                assert!(!descendants.contains(&p.id));
            }
            assert_eq!(parents.len() + descendants.len() + 1, all.len());
        }
    }

    #[test]
    fn test_possible_parents_sorted_by_name() {
        let db = fixtures::db();
        fixtures::region(&db, "zeta", None);
        fixtures::region(&db, "Alpha", None);
        fixtures::region(&db, "beta", None);

        let names: Vec<String> = db
            .regions()
            .get_possible_parents(None)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_descendants_terminate_on_cyclic_data() {
        let db = fixtures::db();
        let (a, b, c) = chain(&db);
        db.conn()
            .execute("UPDATE regions SET parent_id = ?1 WHERE id = ?2", params![c, a])
            .unwrap();

        let repo = db.regions();
        assert_eq!(repo.descendant_ids(a).unwrap(), HashSet::from([b, c]));
        assert_eq!(repo.path(c).unwrap().len(), 3);
    }

    #[test]
    fn test_get_by_id_with_children() {
        let db = fixtures::db();
        let (a, b, _c) = chain(&db);

        let item = db.regions().get_by_id_with_children(a).unwrap().unwrap();
        assert_eq!(item.node.id, a);
        assert_eq!(ids(&item.children.iter().map(|c| c.node.clone()).collect::<Vec<_>>()), vec![b]);
        assert!(db.regions().get_by_id_with_children(999).unwrap().is_none());
    }

    #[test]
    fn test_delete_with_children_fails_and_tree_unchanged() {
        let db = fixtures::db();
        let (a, b, c) = chain(&db);

        let err = db.regions().delete(b).unwrap_err();
        assert!(matches!(err, StoreError::HasChildren { id, .. } if id == b));

        let all = db.regions().all().unwrap();
        assert_eq!(ids(&all), vec![a, b, c]);
        assert_eq!(db.regions().require(c).unwrap().parent_id, Some(b));
    }

    #[test]
    fn test_delete_position_with_children_fails() {
        let db = fixtures::db();
        let lead = fixtures::position(&db, "Lead", None);
        fixtures::position(&db, "Helper", Some(lead));

        let err = db.positions().delete(lead).unwrap_err();
        assert!(matches!(err, StoreError::HasChildren { kind: "position", .. }));
        assert_eq!(db.positions().all().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_blocked_by_dependents() {
        let db = fixtures::db();
        let pos = fixtures::position(&db, "Coach", None);
        let m = fixtures::member(&db, "Ann", None);
        fixtures::assign(&db, m, pos, true);

        let err = db.positions().delete(pos).unwrap_err();
        assert!(matches!(err, StoreError::HasDependents { count: 1, .. }));

        let region = fixtures::region(&db, "East", None);
        db.conn()
            .execute("UPDATE members SET region_id = ?1 WHERE id = ?2", params![region, m])
            .unwrap();
        assert!(matches!(
            db.regions().delete(region),
            Err(StoreError::HasDependents { .. })
        ));
    }

    #[test]
    fn test_delete_leaf() {
        let db = fixtures::db();
        let (a, b, c) = chain(&db);

        db.regions().delete(c).unwrap();
        assert_eq!(ids(&db.regions().all().unwrap()), vec![a, b]);
        assert!(matches!(
            db.regions().delete(c),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_path_label() {
        let db = fixtures::db();
        let (_a, _b, c) = chain(&db);
        assert_eq!(db.regions().path_label(c).unwrap(), "A / B / C");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let db = fixtures::db();
        fixtures::region(&db, "Northeast", None);
        fixtures::region(&db, "South", None);

        let found = db.regions().search("EAST").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Northeast");
    }

    #[test]
    fn test_new_positions_are_ranked_after_siblings() {
        let db = fixtures::db();
        let root = fixtures::position(&db, "Root", None);
        let a = fixtures::position(&db, "A", Some(root));
        let b = fixtures::position(&db, "B", Some(root));

        let repo = db.positions();
        assert_eq!(repo.require(a).unwrap().rank, 0);
        assert_eq!(repo.require(b).unwrap().rank, 1);
    }

    #[test]
    fn test_move_up_and_down() {
        let db = fixtures::db();
        let a = fixtures::position(&db, "A", None);
        let b = fixtures::position(&db, "B", None);
        let c = fixtures::position(&db, "C", None);

        let repo = db.positions();
        assert!(repo.move_up(c).unwrap());
        let order: Vec<i64> = repo.all_sorted().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![a, c, b]);

        assert!(!repo.move_up(a).unwrap());
        assert!(repo.move_down(a).unwrap());
        let order: Vec<i64> = repo.all_sorted().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert!(!repo.move_down(b).unwrap());
    }

    #[test]
    fn test_update_hierarchy_applies_batch() {
        let db = fixtures::db();
        let a = fixtures::position(&db, "A", None);
        let b = fixtures::position(&db, "B", None);

        let repo = db.positions();
        repo.update_hierarchy(&[HierarchyEntry {
            id: b,
            parent_id: Some(a),
            rank: 0,
        }])
        .unwrap();

        assert_eq!(repo.require(b).unwrap().parent_id, Some(a));
    }

    #[test]
    fn test_update_hierarchy_rejects_cycles() {
        let db = fixtures::db();
        let a = fixtures::position(&db, "A", None);
        let b = fixtures::position(&db, "B", Some(a));

        let repo = db.positions();
        let err = repo
            .update_hierarchy(&[HierarchyEntry {
                id: a,
                parent_id: Some(b),
                rank: 0,
            }])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(
            err.to_string(),
            format!("invalid parent: position {} cannot be placed under its own subtree", a)
        );
        assert_eq!(repo.require(a).unwrap().parent_id, None);
    }

    #[test]
    fn test_build_forest() {
        let db = fixtures::db();
        let root = fixtures::position(&db, "Root", None);
        let second = fixtures::position(&db, "Second", Some(root));
        let first = fixtures::position(&db, "First", Some(root));
        let other = fixtures::position(&db, "Other", None);
        db.positions().move_up(first).unwrap();

        let forest = build_forest(db.positions().all_sorted().unwrap());
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node.id, root);
        assert_eq!(forest[1].node.id, other);
        let kids: Vec<i64> = forest[0].children.iter().map(|c| c.node.id).collect();
        assert_eq!(kids, vec![first, second]);
    }
}
