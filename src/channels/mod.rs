//! Versioned state channels.
//!
//! Each channel wraps one slice of session state together with a version
//! counter that the barrier (see [`crate::app::App::apply_barrier`]) bumps
//! only when a reducer actually changed the channel's content. Nodes never
//! see a `Channel` directly — they read an immutable [`crate::state::StateSnapshot`]
//! and write through a [`crate::node::NodePartial`].

pub mod errors;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::analysis::{GapReport, QualityScore};
use crate::documents::Document;
use crate::message::Message;
use crate::outline::OutlineNode;
use crate::writing::Section;
use errors::ErrorEvent;

/// Common behavior shared by every versioned state channel.
pub trait Channel {
    /// The value type this channel stores.
    type Item;

    /// Mutable access to the underlying value. Mutating through this method
    /// does **not** bump the version; only the barrier does that, after
    /// comparing before/after snapshots.
    fn get_mut(&mut self) -> &mut Self::Item;

    /// A cloned, independent view of the current value.
    fn snapshot(&self) -> Self::Item;

    /// The channel's current version.
    fn version(&self) -> u32;

    /// Overwrite the channel's version (used by the barrier after detecting a change).
    fn set_version(&mut self, version: u32);

    /// Number of logical entries held by the channel.
    fn len(&self) -> usize;

    /// Whether the channel currently holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! channel_newtype {
    ($name:ident, $item:ty, $len:expr) => {
        #[derive(Clone, Debug, PartialEq, Default)]
        pub struct $name {
            value: $item,
            version: u32,
        }

        impl $name {
            #[must_use]
            pub fn new(value: $item, version: u32) -> Self {
                Self { value, version }
            }
        }

        impl Channel for $name {
            type Item = $item;

            fn get_mut(&mut self) -> &mut Self::Item {
                &mut self.value
            }

            fn snapshot(&self) -> Self::Item {
                self.value.clone()
            }

            fn version(&self) -> u32 {
                self.version
            }

            fn set_version(&mut self, version: u32) {
                self.version = version;
            }

            fn len(&self) -> usize {
                #[allow(clippy::redundant_closure_call)]
                ($len)(&self.value)
            }
        }
    };
}

channel_newtype!(MessagesChannel, Vec<Message>, |v: &Vec<Message>| v.len());
channel_newtype!(
    ExtrasChannel,
    FxHashMap<String, Value>,
    |v: &FxHashMap<String, Value>| v.len()
);
channel_newtype!(ErrorsChannel, Vec<ErrorEvent>, |v: &Vec<ErrorEvent>| v
    .len());

/// Accumulated, deduplicated document set gathered across search iterations.
channel_newtype!(DocumentsChannel, Vec<Document>, |v: &Vec<Document>| v
    .len());

/// The current outline tree, replaced wholesale by the outline builder/refiner.
channel_newtype!(OutlineChannel, Option<OutlineNode>, |v: &Option<
    OutlineNode,
>| v.as_ref()
    .map(|n| n.leaf_count())
    .unwrap_or(0));

/// Generated sections keyed by their outline node id.
channel_newtype!(
    SectionsChannel,
    FxHashMap<u32, Section>,
    |v: &FxHashMap<u32, Section>| v.len()
);

/// The latest quality aggregate + gap report for the accumulated document set.
channel_newtype!(
    QualityChannel,
    Option<(QualityScore, GapReport)>,
    |v: &Option<(QualityScore, GapReport)>| usize::from(v.is_some())
);
