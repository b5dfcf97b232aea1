/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! The compositor scene graph: layers whose visual state lives in shared,
//! indexed property trees, a double-buffered pending/active tree pair with a
//! single audited transfer between them, a stateless draw-property resolver,
//! and the root-frame viewport that splits scroll gestures between the
//! visual and layout viewports.

pub mod draw_properties;
pub mod geometry;
pub mod layer;
pub mod layer_tree;
pub mod property_tree;
pub mod settings;
pub mod units;
pub mod viewport;

pub use crate::draw_properties::{
    DrawProperties, ResourceId, ResourceProvider, SharedQuadState, compute_draw_properties,
};
pub use crate::layer::{ChangeFlags, Layer, LayerDebugInfo, LayerKind, ScrollbarOrientation};
pub use crate::layer_tree::{LayerTree, LayerTreeHost, LayerTreeState, TreeKind};
pub use crate::property_tree::{
    BlendMode, ClipNode, ClipTree, EffectNode, EffectTree, PropertyTree, PropertyTrees,
    ScrollNode, ScrollTree, TransformNode, TransformTree,
};
pub use crate::settings::CompositorSettings;
pub use crate::units::{
    DevicePixel, DeviceRect, LayerIntRect, LayerIntSize, LayerPixel, LayerRect, LayerSize,
    LayerTransform, LayerVector2D, ScreenTransform, ScrollOffset,
};
pub use crate::viewport::{
    RootFrameViewport, ScrollAlignment, ScrollBehavior, ScrollCallback, ScrollGranularity,
    ScrollIntoViewParams, ScrollRestoreState, ScrollResult, ScrollSequencer, ScrollType,
    ScrollableArea, ViewportToScrollFirst,
};
