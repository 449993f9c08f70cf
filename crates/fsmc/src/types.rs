use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

/// Insertion-ordered map. Declarations are kept in source order until the
/// model is sorted.
pub type Map<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
