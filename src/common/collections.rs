//! Collections used across the crate.
//!
//! Keys are small ids and connector names, so the faster non-cryptographic
//! hasher is always preferable.

pub use std::collections::{BTreeMap, BTreeSet};

pub type HashSet<K> = rustc_hash::FxHashSet<K>;
