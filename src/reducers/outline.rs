use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Replaces the outline wholesale. Used by both the initial build and any
/// later refinement pass; the outline builder is responsible for preserving
/// node ids across a refinement so downstream section caching stays valid.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct SetOutline;

impl Reducer for SetOutline {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(outline) = &update.outline {
            *state.outline.get_mut() = Some(outline.clone());
        }
    }
}
