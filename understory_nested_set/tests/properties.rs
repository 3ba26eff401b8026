// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests: random edit sequences never break the encoding.

use proptest::prelude::*;
use understory_nested_set::{Forest, Position, TreeError, TreeOptions, check};
use understory_nested_store::backends::{MemoryStore, RowId};
use understory_nested_store::{Store, StoreError, TreeFields};

type TestForest = Forest<MemoryStore<u16>>;

#[derive(Clone, Debug)]
enum Edit {
    /// Insert below the picked node, or as a new root when `None`.
    Create { parent: Option<usize> },
    /// Assign a new parent and save.
    Reparent { node: usize, parent: Option<usize> },
    /// Positional move.
    MoveTo {
        node: usize,
        target: usize,
        position: Position,
    },
    Delete { node: usize },
}

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::FirstChild),
        Just(Position::LastChild),
        Just(Position::Left),
        Just(Position::Right),
    ]
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => proptest::option::of(any::<usize>()).prop_map(|parent| Edit::Create { parent }),
        3 => (any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(node, parent)| Edit::Reparent { node, parent }),
        3 => (any::<usize>(), any::<usize>(), position())
            .prop_map(|(node, target, position)| Edit::MoveTo { node, target, position }),
        1 => any::<usize>().prop_map(|node| Edit::Delete { node }),
    ]
}

fn live(forest: &TestForest) -> Vec<RowId> {
    forest
        .manager()
        .all_ordered()
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect()
}

/// Every row with its parent and fields, in tree order.
fn snapshot(forest: &TestForest) -> Vec<(RowId, Option<RowId>, TreeFields)> {
    live(forest)
        .into_iter()
        .map(|key| {
            let row = forest.store().row(key).unwrap().unwrap();
            (key, row.parent, row.fields)
        })
        .collect()
}

/// Run one edit. Shape violations are expected and must leave the store as
/// it was; anything else must succeed.
fn apply(forest: &mut TestForest, edit: &Edit, serial: &mut u16) {
    let keys = live(forest);
    let pick = |i: usize| keys[i % keys.len()];
    let before = snapshot(forest);
    let result = match *edit {
        Edit::Create { parent } => {
            *serial += 1;
            let parent = if keys.is_empty() { None } else { parent.map(pick) };
            forest.create(parent, *serial).map(drop)
        }
        _ if keys.is_empty() => Ok(()),
        Edit::Reparent { node, parent } => {
            let mut node = forest.get(pick(node)).unwrap();
            node.parent = parent.map(pick);
            forest.save(&mut node)
        }
        Edit::MoveTo {
            node,
            target,
            position,
        } => {
            let mut node = forest.get(pick(node)).unwrap();
            forest.move_to(&mut node, pick(target), position)
        }
        Edit::Delete { node } => forest.delete(pick(node)).map(drop),
    };
    match result {
        Ok(()) => {}
        Err(TreeError::InvalidParent(_) | TreeError::InvalidMove(_)) => {
            assert_eq!(snapshot(forest), before, "rejected {edit:?} changed the store");
        }
        Err(err) => panic!("{edit:?} failed: {err}"),
    }
}

fn build(edits: &[Edit]) -> TestForest {
    let mut forest = Forest::with_options(
        MemoryStore::new(),
        TreeOptions::new().check_invariants(true),
    );
    let mut serial = 0;
    for edit in edits {
        apply(&mut forest, edit, &mut serial);
    }
    forest
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Any sequence of edits keeps every tree well formed.
    #[test]
    fn edits_preserve_invariants(edits in prop::collection::vec(edit(), 1..40)) {
        let forest = build(&edits);
        prop_assert_eq!(check::validate_all(forest.store()), Ok::<(), TreeError<StoreError>>(()));
        prop_assert!(!forest.store().in_transaction());
    }

    /// `b` is below `a` exactly when `a` is above `b`, and the boundary
    /// arithmetic agrees with the row count.
    #[test]
    fn ancestors_and_descendants_agree(edits in prop::collection::vec(edit(), 1..30)) {
        let forest = build(&edits);
        let tree = forest.manager();
        let keys = live(&forest);
        for &a in &keys {
            let below: Vec<RowId> = tree.descendants(a, false).unwrap().into_iter().map(|r| r.key).collect();
            prop_assert_eq!(below.len(), tree.descendant_count(a).unwrap() as usize);
            for &b in &keys {
                let above = tree.ancestors(b, false).unwrap();
                prop_assert_eq!(below.contains(&b), above.iter().any(|r| r.key == a));
            }
        }
    }

    /// A node can never become its own parent, and trying changes nothing.
    #[test]
    fn self_parenting_is_rejected(
        edits in prop::collection::vec(edit(), 1..30),
        pick in any::<usize>(),
    ) {
        let mut forest = build(&edits);
        let keys = live(&forest);
        prop_assume!(!keys.is_empty());
        let key = keys[pick % keys.len()];
        let before = snapshot(&forest);

        let mut node = forest.get(key).unwrap();
        node.parent = Some(key);
        let result = forest.save(&mut node);
        prop_assert!(matches!(result, Err(TreeError::InvalidParent(_))));
        prop_assert_eq!(snapshot(&forest), before);
    }

    /// Saving a node without changing its parent leaves every row alone.
    #[test]
    fn same_parent_save_is_a_noop(
        edits in prop::collection::vec(edit(), 1..30),
        pick in any::<usize>(),
    ) {
        let mut forest = build(&edits);
        let keys = live(&forest);
        prop_assume!(!keys.is_empty());
        let key = keys[pick % keys.len()];
        let before = snapshot(&forest);

        let mut node = forest.get(key).unwrap();
        forest.save(&mut node).unwrap();
        prop_assert_eq!(snapshot(&forest), before);
        prop_assert_eq!(node.parent, forest.store().row(key).unwrap().unwrap().parent);
    }
}
