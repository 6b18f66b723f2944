//! Ordering of distinct keys that share a hash inside a tree bin.
//!
//! A tree bin orders its nodes by cached hash first. Keys with equal hashes
//! are ordered by the map's `TieBreak`, and whatever it leaves unordered
//! falls back to the arena key. A lookup can only descend one side of an
//! equal-hash node when the tie-break ordered it against the key sought;
//! otherwise it has to search both subtrees.
//!
//! `Unordered` (the default) never orders anything, so lookups among
//! equal-hash keys cost one equality check per key in the bin. Maps of
//! `Ord` keys can use `NaturalOrder` to keep those lookups logarithmic.

use core::cmp::Ordering;

/// Orders keys whose hashes are equal.
///
/// `Q` is the type compared: the key type itself for placement, or any
/// borrowed form used for lookups. For a given map, the answers for `K` and
/// for every `Q` that `K` borrows as must agree, the same contract
/// `Borrow` places on `Ord`. `Some(Ordering::Equal)` for keys that are not
/// equal is tolerated and treated as unordered.
pub trait TieBreak<Q: ?Sized> {
    fn compare(&self, a: &Q, b: &Q) -> Option<Ordering>;
}

/// Leaves equal-hash keys unordered; they are told apart by equality alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unordered;

impl<Q: ?Sized> TieBreak<Q> for Unordered {
    #[inline]
    fn compare(&self, _a: &Q, _b: &Q) -> Option<Ordering> {
        None
    }
}

/// Orders equal-hash keys by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<Q: ?Sized + Ord> TieBreak<Q> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &Q, b: &Q) -> Option<Ordering> {
        Some(a.cmp(b))
    }
}
