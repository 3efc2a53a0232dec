use super::Reducer;
use crate::{channels::Channel, node::NodePartial, state::VersionedState};

/// Append-only reducer for the errors channel.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddErrors;

impl Reducer for AddErrors {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial) {
        if let Some(errors) = &update.errors {
            if !errors.is_empty() {
                state.errors.get_mut().extend(errors.clone());
            }
        }
    }
}
