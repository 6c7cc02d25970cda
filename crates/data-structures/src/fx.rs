//! Type aliases for [`rustc_hash`] collections.

pub use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

/// Hash-map entry type, re-exported for convenience.
pub type StdEntry<'a, K, V> = std::collections::hash_map::Entry<'a, K, V>;
