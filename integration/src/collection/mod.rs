// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! # Collection Module
//!
//! This module provides specialized collection types used throughout the integration crate
//! for handling variable-cardinality data structures common in financial trading systems.
//!
//! ## Core Types
//!
//! - [`FnvIndexMap<K, V>`] - Fast hash map using FNV hasher for better performance
//! - [`FnvIndexSet<T>`] - Fast hash set using FNV hasher for better performance
//!
//! ## Use Cases
//!
//! Used for the event bus's subscriber/history tables, the decision
//! modules' per-instance state registries, and the retry policy table.
//!
//! ## Performance Considerations
//!
//! The FNV hasher types (`FnvIndexMap`, `FnvIndexSet`) provide better performance
//! than the default hasher for small keys commonly used in trading applications
//! (like instrument symbols, exchange IDs, etc.).

/// Fast IndexMap using FNV hasher for better performance with small keys
pub type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, fnv::FnvBuildHasher>;

/// Fast IndexSet using FNV hasher for better performance with small keys
pub type FnvIndexSet<T> = indexmap::IndexSet<T, fnv::FnvBuildHasher>;
