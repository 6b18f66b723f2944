//! Hash spreading, bin indexing and table sizing.
//!
//! Bin tables always have a power-of-two length, so an index only looks at
//! the low bits of a hash. `spread` folds the upper half of the hasher's
//! output into the lower half before masking so keys that differ only in
//! their high bits still land in different bins.

use core::hash::{BuildHasher, Hash};

/// Table length used when the first insertion allocates a table that was
/// created without an explicit capacity.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 4;

/// Largest table length. Requests above this are clamped.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Chain length at which a bin is converted to a tree bin.
pub const TREEIFY_THRESHOLD: usize = 8;

/// Population at or below which a tree bin split by a resize goes back to a chain.
pub const UNTREEIFY_THRESHOLD: usize = 6;

/// Smallest table length for which bins may be treeified. Below it an
/// overlong chain grows the table instead.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// XOR the upper 32 bits of `h` into the lower 32.
#[inline]
pub fn spread(h: u64) -> u64 {
    h ^ (h >> 32)
}

/// Index of the bin holding `hash` in a table of length `capacity`.
///
/// `capacity` must be a non-zero power of two.
#[inline]
pub fn bin_index(hash: u64, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}

/// Smallest power of two `>= cap`, clamped to `1..=MAXIMUM_CAPACITY`.
pub fn table_size_for(cap: usize) -> usize {
    if cap <= 1 {
        1
    } else if cap >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        cap.next_power_of_two()
    }
}

/// Resize threshold for a table of length `capacity`; saturates once the
/// table can no longer grow.
pub(crate) fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let ft = capacity as f64 * f64::from(load_factor);
    if capacity < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f64 {
        ft as usize
    } else {
        usize::MAX
    }
}

/// Hash `q` with `hasher` and spread the result.
#[inline]
pub(crate) fn make_hash<Q, S>(hasher: &S, q: &Q) -> u64
where
    Q: ?Sized + Hash,
    S: BuildHasher,
{
    spread(hasher.hash_one(q))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: spreading moves high-bit differences into the low bits.
    #[test]
    fn spread_mixes_high_bits_into_low() {
        let a = 1u64 << 32;
        let b = 2u64 << 32;
        assert_eq!(bin_index(a, 16), bin_index(b, 16));
        assert_ne!(bin_index(spread(a), 16), bin_index(spread(b), 16));
        assert_eq!(spread(0), 0);
        assert_eq!(spread(0xffff_ffff), 0xffff_ffff);
    }

    #[test]
    fn index_masks_low_bits() {
        assert_eq!(bin_index(0x1234, 16), 0x4);
        assert_eq!(bin_index(0x1234, 1), 0);
        assert_eq!(bin_index(u64::MAX, 64), 63);
    }

    /// Invariant: table sizes are powers of two within `1..=MAXIMUM_CAPACITY`.
    #[test]
    fn table_size_rounds_up_and_clamps() {
        assert_eq!(table_size_for(0), 1);
        assert_eq!(table_size_for(1), 1);
        assert_eq!(table_size_for(2), 2);
        assert_eq!(table_size_for(17), 32);
        assert_eq!(table_size_for(64), 64);
        assert_eq!(table_size_for(MAXIMUM_CAPACITY + 1), MAXIMUM_CAPACITY);
        assert_eq!(table_size_for(usize::MAX), MAXIMUM_CAPACITY);
    }

    #[test]
    fn threshold_saturates_at_maximum() {
        assert_eq!(threshold_for(16, 0.75), 12);
        assert_eq!(threshold_for(1 << 14, 0.75), 12_288);
        assert_eq!(threshold_for(MAXIMUM_CAPACITY, 0.75), usize::MAX);
        assert_eq!(threshold_for(16, 1e12), usize::MAX);
    }
}
