// Fast hash maps / sets using AHash instead of the default SipHash.
// Import these throughout the codebase with `use crate::types::{HashMap, HashSet}`.
// Also import `HashMapExt` / `HashSetExt` when you need `::new()` or `::with_capacity()`.
pub type HashMap<K, V> = ahash::HashMap<K, V>;
pub type HashSet<K> = ahash::HashSet<K>;
pub use ahash::HashMapExt;
pub use ahash::HashSetExt;

/// Strand character used across the crate: `'+'`, `'-'`, or `'.'` (unknown).
pub type Strand = char;

pub const STRAND_UNKNOWN: Strand = '.';
