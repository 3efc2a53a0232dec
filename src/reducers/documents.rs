use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Merges newly retrieved documents into the accumulated, deduplicated set.
///
/// Deduplication is by exact `url`; the first-seen document for a given URL
/// keeps its adapter attribution (§4.3 of the orchestration spec), so later
/// arrivals for an already-known URL are dropped rather than overwriting it.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct MergeDocuments;

impl Reducer for MergeDocuments {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        let Some(incoming) = &update.documents else {
            return;
        };
        if incoming.is_empty() {
            return;
        }
        let docs = state.documents.get_mut();
        let mut seen: std::collections::HashSet<String> =
            docs.iter().map(|d| d.url.clone()).collect();
        for doc in incoming {
            if seen.insert(doc.url.clone()) {
                docs.push(doc.clone());
            }
        }
    }
}
