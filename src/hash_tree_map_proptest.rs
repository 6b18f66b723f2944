#![cfg(test)]

// Property tests for HashTreeMap kept inside the crate so they can check the
// bin table's structural invariants after every operation.

use crate::hash_tree_map::{Handle, HashTreeMap};
use crate::testing::{ConstBuildHasher, HighBitsBuildHasher};
use crate::tie_break::{NaturalOrder, TieBreak};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertIfAbsent(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    RetainEven,
    CursorSweep(usize),
    Iterate,
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario(max_pool: usize) -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,6}", 1..=max_pool).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertIfAbsent(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,6}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::RetainEven),
            1 => idx.clone().prop_map(OpI::CursorSweep),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_state_machine<S, T>(
    mut sut: HashTreeMap<Key, i32, S, T>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    T: TieBreak<Key> + TieBreak<str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let prev = sut.insert(k.clone(), v);
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                let h = sut.find(&k).expect("inserted key must be found");
                if let Some(&old) = live.get(&k) {
                    prop_assert_eq!(h, old, "replacement keeps the entry");
                }
                live.insert(k, h);
            }
            OpI::InsertIfAbsent(i, v) => {
                let k = key_from(&pool, i);
                let kept = sut.insert_if_absent(k.clone(), v).copied();
                prop_assert_eq!(kept, model.get(&k).copied());
                model.entry(k.clone()).or_insert(v);
                let h = sut.find(&k).expect("key present after insert_if_absent");
                live.insert(k, h);
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove_entry(k.0.as_str()), model.remove_entry(&k));
                if let Some(h) = live.remove(&k) {
                    stale.push(h);
                }
                prop_assert!(sut.find(&k).is_none());
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                if let Some(&h) = live.get(&k) {
                    prop_assert_eq!(h.value(&sut), model.get(&k));
                }
            }
            OpI::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(&h) = live.get(&k) {
                    let vr = h.value_mut(&mut sut).expect("live handle should resolve");
                    *vr = vr.wrapping_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.wrapping_add(d);
                }
            }
            OpI::RetainEven => {
                sut.retain(|_, v| *v % 2 == 0);
                model.retain(|_, v| *v % 2 == 0);
                live.retain(|k, h| {
                    let keep = model.contains_key(k);
                    if !keep {
                        stale.push(*h);
                    }
                    keep
                });
            }
            OpI::CursorSweep(stride) => {
                // Remove every `stride + 1`-th visited entry through the cursor.
                let mut c = sut.cursor();
                let mut visited = BTreeSet::new();
                let mut n = 0usize;
                while let Some((k, _)) = c.advance(&sut).expect("no external modification") {
                    let k = k.clone();
                    prop_assert!(visited.insert(k.clone()), "entry visited twice");
                    if n % (stride + 1) == 0 {
                        let (rk, rv) = c.remove_current(&mut sut).expect("current entry");
                        prop_assert_eq!(&rk, &k);
                        prop_assert_eq!(Some(rv), model.remove(&k));
                        if let Some(h) = live.remove(&k) {
                            stale.push(h);
                        }
                    }
                    n += 1;
                }
                prop_assert_eq!(n, visited.len());
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                prop_assert_eq!(sut.iter().count(), model.len());
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                stale.extend(live.drain().map(|(_, h)| h));
            }
        }

        // Post-conditions after each op
        sut.table.assert_invariants();
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert/insert_if_absent/remove return what HashMap returns.
// - Handles are stable while an entry lives and never resolve after removal.
// - Cursor removal visits each entry once and removes exactly what it reports.
// - Bin placement, chain/tree agreement and red-black shape hold after each op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario(24)) {
        run_state_machine(HashTreeMap::new(), pool, ops)?;
    }
}

// Property: Same state machine with every key in one bin, so bins treeify,
// split and untreeify constantly.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_collisions((pool, ops) in arb_scenario(40)) {
        run_state_machine(HashTreeMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Property: Same state machine with one bin ordered by `Key`'s `Ord`, so
// tree lookups descend by key comparison instead of searching both sides.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_natural_order((pool, ops) in arb_scenario(40)) {
        run_state_machine(HashTreeMap::with_tie_break(ConstBuildHasher, NaturalOrder), pool, ops)?;
    }
}

// Property: Arbitrary insert/remove sequences over integer keys that share a
// bin but have distinct hashes keep a valid tree and agree with HashMap.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_tree_bin_insert_remove(ops in proptest::collection::vec((any::<bool>(), 0u64..128), 1..400)) {
        let mut sut: HashTreeMap<u64, u64, HighBitsBuildHasher> =
            HashTreeMap::with_hasher(HighBitsBuildHasher);
        let mut model: HashMap<u64, u64> = HashMap::new();
        for (insert, k) in ops {
            if insert {
                prop_assert_eq!(sut.insert(k, k * 2), model.insert(k, k * 2));
            } else {
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
            }
            sut.table.assert_invariants();
        }
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
        }
    }
}
