// Hashers that force collisions, shared by the unit and property tests.
// Integration tests and benches include this file with `#[path]`.

use std::hash::{BuildHasher, Hasher};

/// Every key hashes to 0, so every key lands in bin 0.
#[derive(Clone, Default)]
pub(crate) struct ConstBuildHasher;
pub(crate) struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

/// Integer keys hash to `key << 48`: distinct hashes that still share bin 0
/// for every table of up to 2^16 bins. Tree bins then order by hash.
#[derive(Clone, Default)]
pub(crate) struct HighBitsBuildHasher;
#[derive(Default)]
pub(crate) struct HighBitsHasher(u64);
impl BuildHasher for HighBitsBuildHasher {
    type Hasher = HighBitsHasher;
    fn build_hasher(&self) -> Self::Hasher {
        HighBitsHasher::default()
    }
}
impl Hasher for HighBitsHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.rotate_left(8) ^ u64::from(b);
        }
    }
    fn write_u32(&mut self, n: u32) {
        self.0 = u64::from(n);
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn finish(&self) -> u64 {
        self.0 << 48
    }
}
