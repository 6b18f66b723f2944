#![cfg(test)]

// Property tests for LinkedHashTreeMap against a Vec-based order model.

use crate::config::MapConfig;
use crate::linked_map::{LinkedHashTreeMap, MaxEntries, OrderPolicy};
use crate::testing::ConstBuildHasher;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, i32),
    InsertIfAbsent(u8, i32),
    Get(u8),
    Peek(u8),
    Remove(u8),
    PopFront,
    PopBack,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u8..32;
    let op = prop_oneof![
        6 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::InsertIfAbsent(k, v)),
        3 => key.clone().prop_map(Op::Get),
        1 => key.clone().prop_map(Op::Peek),
        3 => key.prop_map(Op::Remove),
        1 => Just(Op::PopFront),
        1 => Just(Op::PopBack),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..300)
}

/// Ordered model: oldest first.
struct Model {
    entries: Vec<(u8, i32)>,
    policy: OrderPolicy,
    max: usize,
}

impl Model {
    fn position(&self, k: u8) -> Option<usize> {
        self.entries.iter().position(|(ek, _)| *ek == k)
    }

    fn access(&mut self, pos: usize) -> usize {
        if self.policy == OrderPolicy::Access {
            let e = self.entries.remove(pos);
            self.entries.push(e);
            self.entries.len() - 1
        } else {
            pos
        }
    }

    fn add(&mut self, k: u8, v: i32) {
        self.entries.push((k, v));
        if self.entries.len() > self.max {
            self.entries.remove(0);
        }
    }
}

fn run<S: BuildHasher>(
    mut sut: LinkedHashTreeMap<u8, i32, S, MaxEntries>,
    policy: OrderPolicy,
    max: usize,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model = Model {
        entries: Vec::new(),
        policy,
        max,
    };
    for op in ops {
        match op {
            Op::Insert(k, v) => {
                let expect = match model.position(k) {
                    Some(pos) => {
                        let pos = model.access(pos);
                        Some(std::mem::replace(&mut model.entries[pos].1, v))
                    }
                    None => {
                        model.add(k, v);
                        None
                    }
                };
                prop_assert_eq!(sut.insert(k, v), expect);
            }
            Op::InsertIfAbsent(k, v) => {
                let expect = match model.position(k) {
                    Some(pos) => {
                        let pos = model.access(pos);
                        Some(model.entries[pos].1)
                    }
                    None => {
                        model.add(k, v);
                        None
                    }
                };
                prop_assert_eq!(sut.insert_if_absent(k, v).copied(), expect);
            }
            Op::Get(k) => {
                let expect = model.position(k).map(|pos| {
                    let pos = model.access(pos);
                    model.entries[pos].1
                });
                prop_assert_eq!(sut.get(&k).copied(), expect);
            }
            Op::Peek(k) => {
                let expect = model.position(k).map(|pos| model.entries[pos].1);
                prop_assert_eq!(sut.peek(&k).copied(), expect);
            }
            Op::Remove(k) => {
                let expect = model.position(k).map(|pos| model.entries.remove(pos).1);
                prop_assert_eq!(sut.remove(&k), expect);
            }
            Op::PopFront => {
                let expect = if model.entries.is_empty() {
                    None
                } else {
                    Some(model.entries.remove(0))
                };
                prop_assert_eq!(sut.pop_front(), expect);
            }
            Op::PopBack => {
                prop_assert_eq!(sut.pop_back(), model.entries.pop());
            }
            Op::Clear => {
                sut.clear();
                model.entries.clear();
            }
        }

        sut.assert_invariants();
        let order: Vec<(u8, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(&order, &model.entries);
        prop_assert_eq!(sut.len(), model.entries.len());
    }
    Ok(())
}

fn policy() -> impl Strategy<Value = OrderPolicy> {
    prop_oneof![Just(OrderPolicy::Insertion), Just(OrderPolicy::Access)]
}

// Property: iteration order, returned values and eviction match the model
// for both order policies, with and without a size bound.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_order_model(policy in policy(), max in prop_oneof![Just(usize::MAX), 1usize..12], ops in arb_ops()) {
        let sut = LinkedHashTreeMap::with_config_and_hasher(
            MapConfig::default(),
            RandomState::new(),
            policy,
            MaxEntries(max),
        ).expect("default config is valid");
        run(sut, policy, max, ops)?;
    }
}

// Property: same model with every key colliding, so the order list has to
// survive treeify, untreeify and tree splits.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_order_model_collisions(policy in policy(), ops in arb_ops()) {
        let sut = LinkedHashTreeMap::with_config_and_hasher(
            MapConfig::new(4, 0.75).expect("valid config"),
            ConstBuildHasher,
            policy,
            MaxEntries(usize::MAX),
        ).expect("valid config");
        run(sut, policy, usize::MAX, ops)?;
    }
}
