//! treebin-map: a hash map whose overfull bins turn into red-black trees,
//! plus an ordered variant with insertion or access order and eviction.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep worst-case lookups logarithmic under heavy collisions while
//!   the common case stays a short chain walk.
//! - Layers:
//!   - `table`: the entry arena and the power-of-two bin table. Bins are
//!     empty, a chain, or a tree bin (`tree_bin`). Owns resize and the
//!     order-preserving split.
//!   - HashTreeMap<K, V, S, T>: public map over `table`; hashes keys,
//!     returns stable `Handle`s, and hands out fail-fast `Cursor`s. `T` is
//!     the tree-bin tie-break (`tie_break`).
//!   - LinkedHashTreeMap<K, V, S, E, T>: wraps
//!     `HashTreeMap<K, Linked<V>, S, T>` and threads an order list through
//!     the stored values.
//!
//! Constraints
//! - Table length is always a power of two, at most 2^30.
//! - A chain becomes a tree once it reaches 8 entries, but only in tables of
//!   at least 64 bins; smaller tables grow instead.
//! - Resizes split every bin in two by one hash bit, keeping relative order.
//! - Entries never move in memory; chains, trees and the order list all link
//!   entries by generational arena key.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its spread `u64` hash. Resizes and tree ordering use
//!   the stored hash; `K: Hash` is never invoked after insertion.
//! - Tree bins order by hash, then by the map's `TieBreak`, then by arena
//!   key. The default `Unordered` tie-break needs no `Ord` bound and tells
//!   equal-hash keys apart with `Eq` only; `NaturalOrder` uses `K: Ord` to
//!   keep lookups among equal hashes logarithmic.
//!
//! Fail-fast
//! - Every insertion of a new key, removal, `clear`, and access-order move
//!   bumps a modification counter. Cursors compare it on each step and
//!   report `IterError::ConcurrentModification` on mismatch. Borrowing
//!   iterators need no check: the borrow checker already rules out
//!   mutation while they live.
//!
//! Notes and non-goals
//! - Single-threaded data structure; share it behind a lock if needed.
//! - No persistence, no concurrent variant.
//! - Keys are immutable post-insert; there is no `key_mut`.

mod config;
mod error;
pub mod hash_tree_map;
mod hash_tree_map_proptest;
pub mod hashing;
pub mod linked_map;
mod linked_map_proptest;
mod table;
#[cfg(test)]
mod testing;
pub mod tie_break;
mod tree_bin;

// Public surface
pub use config::MapConfig;
pub use error::{ConfigError, IterError};
pub use hash_tree_map::{Cursor, Handle, HashTreeMap};
pub use hashing::{
    DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY, MIN_TREEIFY_CAPACITY,
    TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD,
};
pub use linked_map::{
    EvictionPolicy, LinkedCursor, LinkedHashTreeMap, MaxEntries, NeverEvict, OrderPolicy,
};
pub use tie_break::{NaturalOrder, TieBreak, Unordered};
