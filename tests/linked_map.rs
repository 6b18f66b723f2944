// LinkedHashTreeMap integration suite.
//
// The core invariants exercised:
// - Insertion order: re-inserting an existing key keeps its position.
// - Access order: a successful get moves the entry to the end.
// - Eviction: the policy sees the oldest entry after each new insertion.
// - Cursors over the order list fail fast like HashTreeMap cursors.
use treebin_map::{IterError, LinkedHashTreeMap, MaxEntries, OrderPolicy};

fn order<S, E>(m: &LinkedHashTreeMap<&'static str, i32, S, E>) -> Vec<&'static str> {
    m.keys().copied().collect()
}

// Test: insertion order.
// Verifies: a, b, c iterate as a, b, c, also after re-inserting a.
#[test]
fn insertion_order_ignores_reinsert() {
    let mut m = LinkedHashTreeMap::new();
    m.insert("a", 1);
    m.insert("b", 2);
    m.insert("c", 3);
    assert_eq!(order(&m), ["a", "b", "c"]);
    m.insert("a", 4);
    assert_eq!(order(&m), ["a", "b", "c"]);
    assert_eq!(m.values().copied().collect::<Vec<_>>(), [4, 2, 3]);
}

// Test: access order.
// Verifies: a, b, c then get(a) iterates as b, c, a.
#[test]
fn access_order_moves_on_get() {
    let mut m = LinkedHashTreeMap::with_policy(OrderPolicy::Access);
    m.insert("a", 1);
    m.insert("b", 2);
    m.insert("c", 3);
    assert_eq!(m.get("a"), Some(&1));
    assert_eq!(order(&m), ["b", "c", "a"]);
    assert_eq!(m.front(), Some((&"b", &2)));
    assert_eq!(m.back(), Some((&"a", &1)));
}

// Test: LRU cache.
// Verifies: with room for three entries, the least recently used entry is
// the one evicted.
#[test]
fn lru_cache() {
    let mut cache: LinkedHashTreeMap<&str, i32, _, MaxEntries> = LinkedHashTreeMap::lru(3);
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("c", 3);
    cache.get("a");
    cache.get("b");
    cache.insert("d", 4);
    assert_eq!(order(&cache), ["a", "b", "d"]);
    cache.insert("e", 5);
    assert_eq!(order(&cache), ["b", "d", "e"]);
    assert!(cache.peek("a").is_none());
}

// Test: custom eviction policy.
// Verifies: a closure sees the oldest entry and the current length.
#[test]
fn closure_policy_evicts_by_value() {
    let mut m = LinkedHashTreeMap::with_eviction(
        OrderPolicy::Insertion,
        |_k: &&'static str, v: &i32, _len: usize| *v < 0,
    );
    m.insert("neg", -1);
    assert!(m.is_empty());
    m.insert("pos", 1);
    m.insert("neg", -1);
    assert_eq!(order(&m), ["pos", "neg"]);
}

// Test: fail-fast over the order list.
// Verifies: an external removal fails the next step; cursor removal does
// not, and the walk continues in order.
#[test]
fn linked_cursor_fails_fast() {
    let mut m: LinkedHashTreeMap<&str, i32> =
        [("a", 1), ("b", 2), ("c", 3), ("d", 4)].into_iter().collect();
    let mut c = m.cursor();
    assert_eq!(c.advance(&m), Ok(Some((&"a", &1))));
    assert_eq!(c.remove_current(&mut m), Ok(("a", 1)));
    assert_eq!(c.advance(&m), Ok(Some((&"b", &2))));
    m.remove("d");
    match c.advance(&m) {
        Err(IterError::ConcurrentModification { expected, found }) => assert!(found > expected),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(order(&m), ["b", "c"]);
}
