//! Map and hasher aliases shared by the engine.
//!
//! The default build uses FxHash maps and AHash for label hashing. Enable the
//! `std-hash` feature to fall back to the standard library implementations.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::hash_map::Entry;
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
    pub use std::collections::hash_map::Entry;
}

pub mod hasher {
    use std::hash::{Hash, Hasher};

    #[cfg(feature = "std-hash")]
    pub use std::collections::hash_map::DefaultHasher;

    #[cfg(not(feature = "std-hash"))]
    pub use ahash::AHasher as DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::default()
    }

    /// Hashes `value` with the workspace hasher.
    pub fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
        let mut hasher = new();
        value.hash(&mut hasher);
        hasher.finish()
    }
}
