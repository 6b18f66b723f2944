// HashTreeMap integration suite.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Resizes are invisible: every key stays retrievable with its value.
// - Bins that collide heavily become trees and shrink back to chains
//   without losing entries.
// - Cursors fail fast on external structural change and allow removal
//   through themselves.
// - Removal is idempotent; handles go stale exactly when their entry is
//   removed.
use std::sync::Once;
use treebin_map::{ConfigError, HashTreeMap, IterError, MapConfig, NaturalOrder, TieBreak};

#[path = "../src/testing.rs"]
mod testing;
use testing::{ConstBuildHasher, HighBitsBuildHasher};

static LOGGER: Once = Once::new();

fn init_logging() {
    LOGGER.call_once(|| {
        use simplelog::*;
        let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
    });
}

// Test: resize transparency.
// Assumes: default capacity 16 and load factor 0.75.
// Verifies: 10,000 inserts grow the table to 16384 bins and every key is
// still found with its value.
#[test]
fn resize_is_transparent() {
    init_logging();
    let mut m = HashTreeMap::new();
    for k in 0..10_000u32 {
        assert_eq!(m.insert(k, k * 3), None);
    }
    assert_eq!(m.len(), 10_000);
    assert_eq!(m.capacity(), 16_384);
    for k in 0..10_000u32 {
        assert_eq!(m.get(&k), Some(&(k * 3)));
    }
    assert!(m.get(&10_000).is_none());
}

// Test: treeify and untreeify round trip.
// Assumes: all keys share bin 0 with distinct hashes.
// Verifies: lookups stay correct while the bin grows into a tree, and
// while removals shrink it back to a chain and then to nothing.
#[test]
fn treeify_round_trip() {
    init_logging();
    let mut m = HashTreeMap::with_hasher(HighBitsBuildHasher);
    for k in 0..1_000u64 {
        m.insert(k, k);
        assert_eq!(m.get(&k), Some(&k));
    }
    for k in 0..1_000u64 {
        assert_eq!(m.get(&k), Some(&k), "lost {k} after growth");
    }
    for k in (0..1_000u64).rev() {
        assert_eq!(m.remove(&k), Some(k));
        if k % 97 == 0 {
            for j in 0..k {
                assert_eq!(m.get(&j), Some(&j), "lost {j} after removing {k}");
            }
        }
    }
    assert!(m.is_empty());
    m.insert(5, 5);
    assert_eq!(m.get(&5), Some(&5));
}

fn check_equal_hashes<T>(mut m: HashTreeMap<String, usize, ConstBuildHasher, T>)
where
    T: TieBreak<String> + TieBreak<str>,
{
    for i in 0..300 {
        m.insert(format!("key-{i}"), i);
    }
    for i in 0..300 {
        assert_eq!(m.get(format!("key-{i}").as_str()), Some(&i));
    }
    assert!(m.get("key-300").is_none());
    for i in (0..300).step_by(2) {
        assert_eq!(m.remove(format!("key-{i}").as_str()), Some(i));
    }
    for i in 0..300 {
        assert_eq!(m.contains_key(format!("key-{i}").as_str()), i % 2 == 1);
    }
}

// Test: equal hashes, distinct keys.
// Assumes: every key hashes to the same value.
// Verifies: keys are told apart inside chains and trees, both by equality
// alone and with the natural-order tie-break.
#[test]
fn equal_hashes_resolved() {
    check_equal_hashes(HashTreeMap::with_hasher(ConstBuildHasher));
    check_equal_hashes(HashTreeMap::with_tie_break(ConstBuildHasher, NaturalOrder));
}

// Test: fail-fast cursor.
// Assumes: a cursor records the structural generation when created.
// Verifies: an insert made behind the cursor's back fails its next step,
// while cursor removal and in-place value updates do not.
#[test]
fn cursor_fails_fast() {
    let mut m: HashTreeMap<u32, u32> = (0..100).map(|k| (k, k)).collect();

    let mut c = m.cursor();
    c.advance(&m).unwrap();
    m.insert(1_000, 0);
    assert!(matches!(
        c.advance(&m),
        Err(IterError::ConcurrentModification { .. })
    ));

    let mut c = m.cursor();
    c.advance(&m).unwrap();
    for v in m.values_mut() {
        *v += 1;
    }
    m.insert(0, 0);
    c.remove_current(&mut m).unwrap();
    let mut rest = 0;
    while c.advance(&m).unwrap().is_some() {
        rest += 1;
    }
    // 101 entries, one visited and removed.
    assert_eq!(rest, 100);
    assert_eq!(m.len(), 100);
}

// Test: idempotent removal.
// Verifies: a second removal returns None and leaves size unchanged.
#[test]
fn removal_is_idempotent() {
    let mut m = HashTreeMap::new();
    m.insert("k".to_string(), 1);
    m.insert("j".to_string(), 2);
    assert_eq!(m.remove_entry("k"), Some(("k".to_string(), 1)));
    assert_eq!(m.remove("k"), None);
    assert_eq!(m.len(), 1);
}

// Test: handle liveness.
// Verifies: handles follow their entry across heavy growth and go stale
// once it is removed.
#[test]
fn handles_track_entries() {
    let mut m = HashTreeMap::with_hasher(HighBitsBuildHasher);
    m.insert(7u64, "seven");
    let h = m.find(&7).expect("present");
    for k in 100..600u64 {
        m.insert(k, "filler");
    }
    assert_eq!(h.key(&m), Some(&7));
    assert_eq!(h.value(&m), Some(&"seven"));
    assert_eq!(m.remove_handle(h), Some((7, "seven")));
    assert!(h.value(&m).is_none());
    assert!(m.find(&7).is_none());
}

// Test: configuration.
// Verifies: invalid load factors are rejected; a small load factor grows
// the table earlier.
#[test]
fn configuration() {
    match HashTreeMap::<u8, u8>::with_config(MapConfig::default().with_load_factor(-1.0)) {
        Err(ConfigError::InvalidLoadFactor(lf)) => assert_eq!(lf, -1.0),
        Ok(_) => panic!("negative load factor accepted"),
    }
    let mut m = HashTreeMap::with_config(MapConfig::new(16, 0.25).unwrap()).unwrap();
    for k in 0..5u8 {
        m.insert(k, k);
    }
    assert_eq!(m.capacity(), 32);
}
