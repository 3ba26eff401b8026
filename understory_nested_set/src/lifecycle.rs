// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle operations: placement, deletion, re-parenting and positional moves.
//!
//! Every operation re-reads the stored fields it depends on, runs inside one
//! store transaction and only then writes the computed fields back onto the
//! caller's node. Validation happens before the first write.
//!
//! Moves are expressed through an insertion point `t`: the boundary value, in
//! the numbering from before the move, at which the subtree's `left` should
//! end up. The last child of `p` has `t = p.right`; the first child has
//! `t = p.left + 1`; the left and right siblings of `s` have `t = s.left` and
//! `t = s.right + 1`.

use understory_nested_store::{RangeUpdate, Span, Store, TreeFields, TreeId};

use crate::error::{InvalidMove, InvalidParent, TreeError, TreeResult};
use crate::manager::TreeManager;
use crate::types::{Position, TreeNode};

fn node_key<N: TreeNode, E>(node: &N) -> TreeResult<N::Key, E> {
    node.key().ok_or(TreeError::NodeNotFound)
}

fn delta(to: u32, from: u32) -> i64 {
    i64::from(to) - i64::from(from)
}

impl<S: Store> TreeManager<S> {
    /// Compute the fields of a node about to be stored for the first time.
    ///
    /// Roots open a new tree; children become the rightmost child of their
    /// parent, after space has been made for them.
    pub(crate) fn place<N>(&mut self, node: &mut N) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let parent = node.parent();
        let fields = self.atomic("insert", |m| match parent {
            None => {
                let tree = m.next_tree_id()?;
                tracing::debug!(tree = %tree, "insert root");
                Ok(TreeFields::root(tree))
            }
            Some(parent) => {
                let p = m.fields_of(parent)?;
                let target = p.right - 1;
                tracing::debug!(?parent, tree = %p.tree_id, at = target + 1, "insert child");
                m.create_space(2, target, p.tree_id)?;
                Ok(TreeFields {
                    left: target + 1,
                    right: target + 2,
                    tree_id: p.tree_id,
                    level: p.level + 1,
                })
            }
        })?;
        node.set_tree_fields(fields);
        Ok(())
    }

    /// Bring the stored encoding in line with a changed parent assignment.
    pub(crate) fn reparent<N>(&mut self, node: &mut N) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let key = node_key(node)?;
        let stored = self.stored(key)?;
        let parent = node.parent();
        if stored.parent == parent {
            node.set_tree_fields(stored.fields);
            return Ok(());
        }
        match (parent, stored.parent) {
            (None, _) => self.make_root_node(node),
            (Some(parent), None) => self.make_child_node(node, parent),
            (Some(parent), Some(_)) => {
                if self.fields_of(parent)?.tree_id == stored.fields.tree_id {
                    self.move_within_tree(node, parent)
                } else {
                    self.move_to_new_tree(node, parent)
                }
            }
        }
    }

    /// Close the gap a row leaves behind. Its descendants must already be gone.
    pub(crate) fn release(&mut self, key: S::Key) -> TreeResult<(), S::Error> {
        self.atomic("delete", |m| {
            let old = m.fields_of(key)?;
            tracing::debug!(?key, tree = %old.tree_id, width = old.width(), "delete");
            m.close_gap(old.width(), old.right, old.tree_id)?;
            Ok(())
        })
    }

    /// Detach a node and its subtree into a tree of their own.
    ///
    /// The subtree is renumbered from 1 under a freshly allocated tree id and
    /// the gap it leaves in the old tree is closed.
    pub fn make_root_node<N>(&mut self, node: &mut N) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let key = node_key(node)?;
        let fields = self.atomic("make_root_node", |m| {
            let old = m.fields_of(key)?;
            let tree = m.next_tree_id()?;
            tracing::debug!(?key, from = %old.tree_id, to = %tree, width = old.width(), "make_root_node");
            m.transplant(old, 1, tree, 0)?;
            m.close_gap(old.width(), old.right, old.tree_id)?;
            Ok(TreeFields {
                left: 1,
                right: old.width(),
                tree_id: tree,
                level: 0,
            })
        })?;
        node.set_parent(None);
        node.set_tree_fields(fields);
        Ok(())
    }

    /// Hang a root, with its whole tree, below `parent` as its last child.
    ///
    /// Fails with [`InvalidParent::RootIntoOwnTree`] if `parent` belongs to the
    /// node's own tree.
    pub fn make_child_node<N>(&mut self, node: &mut N, parent: S::Key) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let key = node_key(node)?;
        let fields = self.atomic("make_child_node", |m| {
            let old = m.fields_of(key)?;
            let target = m.fields_of(parent)?;
            if target.tree_id == old.tree_id {
                return Err(InvalidParent::RootIntoOwnTree.into());
            }
            m.attach(key, old, target)
        })?;
        node.set_parent(Some(parent));
        node.set_tree_fields(fields);
        Ok(())
    }

    /// Move a child node, with its subtree, below a `parent` in another tree.
    pub fn move_to_new_tree<N>(&mut self, node: &mut N, parent: S::Key) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        self.reattach("move_to_new_tree", node, parent)
    }

    /// Move a child node, with its subtree, below another `parent` in its own tree.
    ///
    /// Fails with [`InvalidParent::SelfOrDescendant`] if `parent` is the node or
    /// lies inside its subtree.
    pub fn move_within_tree<N>(&mut self, node: &mut N, parent: S::Key) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        self.reattach("move_within_tree", node, parent)
    }

    /// Move a node, with its subtree, relative to `target`.
    ///
    /// The node's parent becomes `target` for the child positions and
    /// `target`'s parent for the sibling positions. Roots may be moved into
    /// other trees; nothing may be placed beside a root.
    pub fn move_to<N>(
        &mut self,
        node: &mut N,
        target: S::Key,
        position: Position,
    ) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let key = node_key(node)?;
        let (parent, fields) = self.atomic("move_to", |m| {
            let old = m.fields_of(key)?;
            let anchor = m.stored(target)?;
            let to = anchor.fields;
            if target == key || old.is_ancestor_of(&to) {
                return Err(InvalidMove::IntoOwnSubtree.into());
            }
            let (point, parent, level) = match position {
                Position::FirstChild => (to.left + 1, Some(target), to.level + 1),
                Position::LastChild => (to.right, Some(target), to.level + 1),
                Position::Left | Position::Right if anchor.parent.is_none() => {
                    return Err(InvalidMove::SiblingOfRoot.into());
                }
                Position::Left => (to.left, anchor.parent, to.level),
                Position::Right => (to.right + 1, anchor.parent, to.level),
            };
            tracing::debug!(?key, ?target, ?position, from = %old.tree_id, to = %to.tree_id, "move_to");
            let fields = if to.tree_id == old.tree_id {
                m.relocate(old, point, level)?
            } else {
                m.splice(old, point, to.tree_id, level)?
            };
            Ok((parent, fields))
        })?;
        node.set_parent(parent);
        node.set_tree_fields(fields);
        Ok(())
    }

    fn reattach<N>(
        &mut self,
        name: &'static str,
        node: &mut N,
        parent: S::Key,
    ) -> TreeResult<(), S::Error>
    where
        N: TreeNode<Key = S::Key>,
    {
        let key = node_key(node)?;
        let fields = self.atomic(name, |m| {
            let old = m.fields_of(key)?;
            let target = m.fields_of(parent)?;
            m.attach(key, old, target)
        })?;
        node.set_parent(Some(parent));
        node.set_tree_fields(fields);
        Ok(())
    }

    /// Make the subtree at `old` the last child of the node at `target`.
    fn attach(
        &mut self,
        key: S::Key,
        old: TreeFields,
        target: TreeFields,
    ) -> TreeResult<TreeFields, S::Error> {
        let level = target.level + 1;
        if target.tree_id != old.tree_id {
            tracing::debug!(?key, from = %old.tree_id, to = %target.tree_id, width = old.width(), "move to new tree");
            return self.splice(old, target.right, target.tree_id, level);
        }
        if old.left <= target.left && target.left <= old.right {
            return Err(InvalidParent::SelfOrDescendant.into());
        }
        tracing::debug!(?key, tree = %old.tree_id, width = old.width(), "move within tree");
        self.relocate(old, target.right, level)
    }

    /// Move the subtree at `old` to insertion point `t` of its own tree.
    ///
    /// One conditional update shifts the subtree, shifts the values between
    /// the subtree and `t` the other way, and re-levels the subtree.
    fn relocate(&mut self, old: TreeFields, t: u32, level: u32) -> TreeResult<TreeFields, S::Error> {
        let width = old.width();
        let (moving_delta, other, other_delta, left) = if t > old.right {
            let other = Span::new(old.right + 1, t - 1);
            (delta(t, old.right + 1), other, -i64::from(width), t - width)
        } else if t < old.left {
            let other = Span::new(t, old.left - 1);
            (delta(t, old.left), other, i64::from(width), t)
        } else {
            (0, Span::EMPTY, 0, old.left)
        };
        self.shift_range_and_relevel(
            old.tree_id,
            old.span(),
            moving_delta,
            other,
            other_delta,
            delta(level, old.level),
        )?;
        Ok(TreeFields {
            left,
            right: left + width - 1,
            tree_id: old.tree_id,
            level,
        })
    }

    /// Move the subtree at `old` to insertion point `t` of tree `dest`.
    fn splice(
        &mut self,
        old: TreeFields,
        t: u32,
        dest: TreeId,
        level: u32,
    ) -> TreeResult<TreeFields, S::Error> {
        let width = old.width();
        self.create_space(width, t - 1, dest)?;
        self.transplant(old, t, dest, level)?;
        // A root takes its whole tree along; nothing is left to close.
        if old.left > 1 {
            self.close_gap(width, old.right, old.tree_id)?;
        }
        Ok(TreeFields {
            left: t,
            right: t + width - 1,
            tree_id: dest,
            level,
        })
    }

    /// Retag the subtree at `old` into `dest`, renumbered to start at `left`
    /// and re-levelled to start at `level`. Leaves a gap in the old tree.
    fn transplant(
        &mut self,
        old: TreeFields,
        left: u32,
        dest: TreeId,
        level: u32,
    ) -> TreeResult<usize, S::Error> {
        self.apply(
            &RangeUpdate::new(old.tree_id)
                .rows(old.span())
                .shift_bounds(Span::ALL, delta(left, old.left))
                .shift_level(Span::ALL, delta(level, old.level))
                .retag(dest),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;
    use understory_nested_store::backends::{MemoryStore, RowId};
    use understory_nested_store::{RecordStore, StoreError};

    type Manager = TreeManager<MemoryStore<&'static str>>;

    fn add(tree: &mut Manager, parent: Option<RowId>, name: &'static str) -> RowId {
        let mut node = Node::new(parent, name);
        tree.place(&mut node).unwrap();
        let fields = node.tree_fields().unwrap();
        tree.store_mut().insert(parent, fields, name).unwrap()
    }

    fn load(tree: &Manager, key: RowId) -> Node<RowId, &'static str> {
        let row = tree.stored(key).unwrap();
        let value = tree.store().value(key).unwrap().unwrap();
        Node::stored(key, row.parent, row.fields, value)
    }

    fn persist(tree: &mut Manager, node: &Node<RowId, &'static str>) {
        let key = node.key().unwrap();
        let fields = node.tree_fields().unwrap();
        tree.store_mut().write(key, node.parent, fields).unwrap();
    }

    fn bounds(tree: &Manager, key: RowId) -> (u32, u32, u32) {
        let f = tree.fields_of(key).unwrap();
        (f.left, f.right, f.level)
    }

    #[test]
    fn children_are_appended_on_the_right() {
        let mut tree = Manager::default();
        let root = add(&mut tree, None, "root");
        let a = add(&mut tree, Some(root), "a");
        let b = add(&mut tree, Some(root), "b");
        let a1 = add(&mut tree, Some(a), "a1");

        assert_eq!(bounds(&tree, root), (1, 8, 0));
        assert_eq!(bounds(&tree, a), (2, 5, 1));
        assert_eq!(bounds(&tree, a1), (3, 4, 2));
        assert_eq!(bounds(&tree, b), (6, 7, 1));

        let other = add(&mut tree, None, "other");
        assert_eq!(tree.fields_of(other).unwrap().tree_id, TreeId(2));
    }

    /// root > [a > [x], b]
    fn small() -> (Manager, [RowId; 4]) {
        let mut tree = Manager::default();
        let root = add(&mut tree, None, "root");
        let a = add(&mut tree, Some(root), "a");
        let x = add(&mut tree, Some(a), "x");
        let b = add(&mut tree, Some(root), "b");
        (tree, [root, a, x, b])
    }

    #[test]
    fn leftward_move_lands_after_the_parents_children() {
        let (mut tree, [root, a, x, b]) = small();
        let mut node = load(&tree, b);
        node.parent = Some(a);
        tree.reparent(&mut node).unwrap();
        persist(&mut tree, &node);

        assert_eq!(bounds(&tree, root), (1, 8, 0));
        assert_eq!(bounds(&tree, a), (2, 7, 1));
        assert_eq!(bounds(&tree, x), (3, 4, 2));
        assert_eq!(bounds(&tree, b), (5, 6, 2));
        assert_eq!(node.tree_fields(), Some(tree.fields_of(b).unwrap()));
    }

    #[test]
    fn rightward_move_takes_the_subtree_along() {
        let (mut tree, [root, a, x, b]) = small();
        let mut node = load(&tree, a);
        node.parent = Some(b);
        tree.reparent(&mut node).unwrap();

        assert_eq!(bounds(&tree, root), (1, 8, 0));
        assert_eq!(bounds(&tree, b), (2, 7, 1));
        assert_eq!(bounds(&tree, a), (3, 6, 2));
        assert_eq!(bounds(&tree, x), (4, 5, 3));
    }

    #[test]
    fn moving_below_a_descendant_is_rejected() {
        let (mut tree, [root, a, x, b]) = small();
        let before: [_; 4] = [root, a, x, b].map(|k| bounds(&tree, k));

        let mut node = load(&tree, a);
        node.parent = Some(x);
        assert_eq!(
            tree.reparent(&mut node),
            Err(TreeError::InvalidParent(InvalidParent::SelfOrDescendant))
        );
        node.parent = Some(a);
        assert_eq!(
            tree.reparent(&mut node),
            Err(TreeError::InvalidParent(InvalidParent::SelfOrDescendant))
        );
        assert_eq!([root, a, x, b].map(|k| bounds(&tree, k)), before);
    }

    #[test]
    fn same_parent_is_a_no_op() {
        let (mut tree, [_, a, x, _]) = small();
        let mut node = load(&tree, x);
        node.set_tree_fields(TreeFields::root(TreeId(9)));
        tree.store_mut().set_fault_after(Some(0));
        tree.reparent(&mut node).unwrap();
        assert_eq!(node.parent, Some(a));
        assert_eq!(node.tree_fields(), Some(tree.fields_of(x).unwrap()));
    }

    #[test]
    fn root_cannot_join_its_own_tree() {
        let (mut tree, [root, a, ..]) = small();
        let mut node = load(&tree, root);
        node.parent = Some(a);
        assert_eq!(
            tree.reparent(&mut node),
            Err(TreeError::InvalidParent(InvalidParent::RootIntoOwnTree))
        );
        assert_eq!(bounds(&tree, root), (1, 8, 0));
    }

    #[test]
    fn detach_and_reattach_round_trip() {
        let (mut tree, [root, a, x, b]) = small();
        let mut node = load(&tree, a);
        node.parent = None;
        tree.reparent(&mut node).unwrap();
        persist(&mut tree, &node);

        let detached = tree.fields_of(a).unwrap();
        assert_eq!(detached.tree_id, TreeId(2));
        assert_eq!((detached.left, detached.right, detached.level), (1, 4, 0));
        assert_eq!(bounds(&tree, x), (2, 3, 1));
        assert_eq!(bounds(&tree, root), (1, 4, 0));
        assert_eq!(bounds(&tree, b), (2, 3, 1));

        node.parent = Some(root);
        tree.reparent(&mut node).unwrap();
        persist(&mut tree, &node);
        assert_eq!(tree.fields_of(a).unwrap().tree_id, TreeId(1));
        assert_eq!(bounds(&tree, root), (1, 8, 0));
        assert_eq!(bounds(&tree, b), (2, 3, 1));
        assert_eq!(bounds(&tree, a), (4, 7, 1));
        assert_eq!(bounds(&tree, x), (5, 6, 2));
        assert_eq!(tree.store().tree_ids(), [TreeId(1)]);
    }

    /// root > [a, b, c]
    fn flat() -> (Manager, [RowId; 4]) {
        let mut tree = Manager::default();
        let root = add(&mut tree, None, "root");
        let a = add(&mut tree, Some(root), "a");
        let b = add(&mut tree, Some(root), "b");
        let c = add(&mut tree, Some(root), "c");
        (tree, [root, a, b, c])
    }

    #[test]
    fn move_to_first_child() {
        let (mut tree, [root, a, b, c]) = flat();
        let mut node = load(&tree, c);
        tree.move_to(&mut node, root, Position::FirstChild).unwrap();
        assert_eq!(bounds(&tree, c), (2, 3, 1));
        assert_eq!(bounds(&tree, a), (4, 5, 1));
        assert_eq!(bounds(&tree, b), (6, 7, 1));
        assert_eq!(node.parent, Some(root));
    }

    #[test]
    fn move_to_sibling_positions() {
        let (mut tree, [root, a, b, c]) = flat();
        let mut node = load(&tree, a);
        tree.move_to(&mut node, c, Position::Left).unwrap();
        assert_eq!(bounds(&tree, b), (2, 3, 1));
        assert_eq!(bounds(&tree, a), (4, 5, 1));
        assert_eq!(bounds(&tree, c), (6, 7, 1));
        assert_eq!(node.parent, Some(root));

        persist(&mut tree, &node);
        let mut node = load(&tree, b);
        tree.move_to(&mut node, c, Position::Right).unwrap();
        assert_eq!(bounds(&tree, a), (2, 3, 1));
        assert_eq!(bounds(&tree, c), (4, 5, 1));
        assert_eq!(bounds(&tree, b), (6, 7, 1));
    }

    #[test]
    fn move_to_last_child_changes_level() {
        let (mut tree, [root, a, b, c]) = flat();
        let mut node = load(&tree, a);
        tree.move_to(&mut node, b, Position::LastChild).unwrap();
        assert_eq!(bounds(&tree, b), (2, 5, 1));
        assert_eq!(bounds(&tree, a), (3, 4, 2));
        assert_eq!(bounds(&tree, c), (6, 7, 1));
        assert_eq!(bounds(&tree, root), (1, 8, 0));
        assert_eq!(node.parent, Some(b));
    }

    #[test]
    fn move_to_rejections() {
        let (mut tree, [root, a, ..]) = flat();
        let mut node = load(&tree, a);
        assert_eq!(
            tree.move_to(&mut node, root, Position::Left),
            Err(TreeError::InvalidMove(InvalidMove::SiblingOfRoot))
        );
        assert_eq!(
            tree.move_to(&mut node, a, Position::FirstChild),
            Err(TreeError::InvalidMove(InvalidMove::IntoOwnSubtree))
        );
        let mut whole = load(&tree, root);
        assert_eq!(
            tree.move_to(&mut whole, a, Position::Right),
            Err(TreeError::InvalidMove(InvalidMove::IntoOwnSubtree))
        );
    }

    #[test]
    fn move_to_another_tree_as_sibling() {
        let (mut tree, [root, a, b, c]) = flat();
        let other = add(&mut tree, None, "other");
        let leaf = add(&mut tree, Some(other), "leaf");

        let mut node = load(&tree, b);
        tree.move_to(&mut node, leaf, Position::Left).unwrap();
        assert_eq!(node.parent, Some(other));
        assert_eq!(tree.fields_of(b).unwrap().tree_id, TreeId(2));
        assert_eq!(bounds(&tree, other), (1, 6, 0));
        assert_eq!(bounds(&tree, b), (2, 3, 1));
        assert_eq!(bounds(&tree, leaf), (4, 5, 1));

        assert_eq!(bounds(&tree, root), (1, 6, 0));
        assert_eq!(bounds(&tree, a), (2, 3, 1));
        assert_eq!(bounds(&tree, c), (4, 5, 1));
    }

    #[test]
    fn whole_tree_moves_under_another_root() {
        let (mut tree, [root, a, ..]) = flat();
        let other = add(&mut tree, None, "other");
        let mut node = load(&tree, root);
        tree.move_to(&mut node, other, Position::FirstChild).unwrap();
        assert_eq!(bounds(&tree, other), (1, 10, 0));
        assert_eq!(bounds(&tree, root), (2, 9, 1));
        assert_eq!(bounds(&tree, a), (3, 4, 2));
        assert_eq!(tree.store().tree_ids(), [TreeId(2)]);
    }

    #[test]
    fn release_closes_the_gap() {
        let (mut tree, [root, a, x, b]) = small();
        tree.release(x).unwrap();
        tree.store_mut().remove(x).unwrap();
        assert_eq!(bounds(&tree, root), (1, 6, 0));
        assert_eq!(bounds(&tree, a), (2, 3, 1));
        assert_eq!(bounds(&tree, b), (4, 5, 1));
    }

    #[test]
    fn failed_move_leaves_no_partial_rewrite() {
        let (mut tree, [root, a, x, b]) = small();
        let other = add(&mut tree, None, "other");
        let before: [_; 5] = [root, a, x, b, other].map(|k| tree.fields_of(k).unwrap());

        // Opening space succeeds, the splice itself fails.
        tree.store_mut().set_fault_after(Some(1));
        let mut node = load(&tree, a);
        node.parent = Some(other);
        assert_eq!(
            tree.reparent(&mut node),
            Err(TreeError::Store(StoreError::InjectedFault))
        );
        assert_eq!(
            [root, a, x, b, other].map(|k| tree.fields_of(k).unwrap()),
            before
        );
        assert_eq!(node.tree_fields(), Some(before[1]));
    }
}
