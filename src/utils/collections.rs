//! Small helpers for constructing the collection types used throughout the
//! state and node-output types. Centralized so the hasher choice can change
//! in one place.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Construct an empty extra-channel map using the crate's standard hasher.
#[must_use]
pub fn new_extra_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
