use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Merges newly-written sections into the accumulated map, keyed by outline
/// node id. A later write for the same id (e.g. a retry) replaces the
/// earlier draft.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct MergeSections;

impl Reducer for MergeSections {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        let Some(incoming) = &update.sections else {
            return;
        };
        if incoming.is_empty() {
            return;
        }
        let sections = state.sections.get_mut();
        for section in incoming {
            sections.insert(section.outline_id, section.clone());
        }
    }
}
