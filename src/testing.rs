//! Deterministic hashers and invariant checks for the unit tests.

use std::hash::{BuildHasher, Hasher};

use crate::ChampMap;

/// Hashes every key into `0..buckets`, so distinct keys share full hashes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ModuloState {
    pub(crate) buckets: u64,
}

impl Default for ModuloState {
    fn default() -> Self {
        ModuloState { buckets: 4 }
    }
}

pub(crate) struct ModuloHasher {
    state: u64,
    buckets: u64,
}

impl Hasher for ModuloHasher {
    fn finish(&self) -> u64 {
        self.state % self.buckets
    }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.state = self.state.wrapping_mul(31).wrapping_add(u64::from(*b));
        }
    }
}

impl BuildHasher for ModuloState {
    type Hasher = ModuloHasher;

    fn build_hasher(&self) -> ModuloHasher {
        ModuloHasher {
            state: 0,
            buckets: self.buckets,
        }
    }
}

/// Uses integer keys as their own hash.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct IdentityState;

pub(crate) struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 << 8) | u64::from(*b);
        }
    }

    fn write_u32(&mut self, n: u32) {
        self.0 = u64::from(n);
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

/// Asserts that the trie behind `map` is canonical and matches its length.
pub(crate) fn assert_canonical<K, V, S>(map: &ChampMap<K, V, S>) {
    assert_eq!(map.root().validate(0, true), map.len(), "reachable entries must match len");
}
