/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Identifiers for layers, elements, and property-tree nodes.
//!
//! Layers reference property-tree nodes by index, never by pointer, so a
//! rebuilt tree can reassign every index without leaving dangling references
//! behind. Each index type reserves `usize::MAX` as its invalid sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The identifier of a layer within a `LayerTree`.
///
/// Always positive, assigned at creation, and never reused while the owning
/// tree lives. The pending and active instance of the same conceptual layer
/// share one `LayerId`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Layer({})", self.0)
    }
}

/// A stable identifier for the content a layer represents, surviving both
/// commits and property-tree rebuilds.
///
/// Scroll offsets are keyed by `ElementId` rather than by scroll-tree index so
/// that a scroller keeps its offset when the scroll tree is rebuilt and every
/// node index is reassigned.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "Element({})", self.0)
    }
}

macro_rules! property_node_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        pub struct $name(pub usize);

        impl $name {
            /// The reserved sentinel meaning "no node".
            pub const INVALID: $name = $name(usize::MAX);

            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                if self.is_valid() {
                    write!(formatter, "{}({})", stringify!($name), self.0)
                } else {
                    write!(formatter, "{}(invalid)", stringify!($name))
                }
            }
        }
    };
}

property_node_id!(
    /// Index of a node in the transform tree.
    TransformNodeId
);
property_node_id!(
    /// Index of a node in the effect tree.
    EffectNodeId
);
property_node_id!(
    /// Index of a node in the clip tree.
    ClipNodeId
);
property_node_id!(
    /// Index of a node in the scroll tree.
    ScrollNodeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinel_is_not_valid() {
        assert!(!TransformNodeId::INVALID.is_valid());
        assert!(TransformNodeId(0).is_valid());
        assert_eq!(ScrollNodeId::default(), ScrollNodeId::INVALID);
    }
}
