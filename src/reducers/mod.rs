mod add_errors;
mod add_messages;
mod documents;
mod map_merge;
mod outline;
mod quality;
mod reducer_registry;
mod sections;

pub use add_errors::AddErrors;
pub use add_messages::AddMessages;
pub use documents::MergeDocuments;
pub use map_merge::MapMerge;
pub use outline::SetOutline;
pub use quality::SetQuality;
pub use reducer_registry::*;
pub use sections::MergeSections;

use crate::node::NodePartial;
use crate::state::VersionedState;
use crate::types::ChannelType;
use miette::Diagnostic;
use thiserror::Error;

/// Unified reducer trait: every reducer mutates VersionedState using a NodePartial delta.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut VersionedState, update: &NodePartial);
}

#[derive(Debug, Error, Diagnostic)]
pub enum ReducerError {
    #[error("no reducers registered for channel: {0:?}")]
    #[diagnostic(
        code(synthgraph::reducers::unknown_channel),
        help("Use GraphBuilder::with_reducer() to register a reducer for {0:?}")
    )]
    UnknownChannel(ChannelType),

    #[error("reducer apply failed for channel {channel:?}: {message}")]
    #[diagnostic(
        code(synthgraph::reducers::apply),
        help("Check that your reducer implementation correctly handles the NodePartial structure")
    )]
    Apply {
        channel: ChannelType,
        message: String,
    },
}
