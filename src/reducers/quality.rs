use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Replaces the quality aggregate + gap report with the analyzer's latest
/// scoring of the accumulated document set.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct SetQuality;

impl Reducer for SetQuality {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(quality) = &update.quality {
            *state.quality.get_mut() = Some(quality.clone());
        }
    }
}
