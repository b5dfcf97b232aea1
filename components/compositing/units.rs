/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Typed pixel units for the scene graph, in the style of
//! `webrender_api::units`.
//!
//! Layer-local geometry lives in [`LayerPixel`] space; everything the draw
//! step hands to a render pass is in [`DevicePixel`] space. Render-surface
//! ("target") space is treated as device space here, which keeps the
//! transform types closed under composition.

use euclid::{Point2D, Rect, Size2D, Transform3D, Vector2D};

/// One unit in a layer's local coordinate space, before any transform is
/// applied.
#[derive(Clone, Copy, Debug)]
pub enum LayerPixel {}

/// A pixel of the output device.
#[derive(Clone, Copy, Debug)]
pub enum DevicePixel {}

pub type LayerIntSize = Size2D<i32, LayerPixel>;
pub type LayerIntRect = Rect<i32, LayerPixel>;
pub type LayerSize = Size2D<f32, LayerPixel>;
pub type LayerRect = Rect<f32, LayerPixel>;
pub type LayerPoint = Point2D<f32, LayerPixel>;
pub type LayerVector2D = Vector2D<f32, LayerPixel>;

/// A scroll offset is a vector from a scroller's origin to its currently
/// visible origin. Offsets are non-negative once clamped.
pub type ScrollOffset = Vector2D<f32, LayerPixel>;

pub type DeviceRect = Rect<f32, DevicePixel>;
pub type DeviceIntRect = Rect<i32, DevicePixel>;

/// A transform between two layer-local spaces (a node's space and its
/// parent's, or a layer's space and its render target's source space).
pub type LayerTransform = Transform3D<f32, LayerPixel, LayerPixel>;

/// A transform from a layer-local space to device (or render-surface target)
/// space.
pub type ScreenTransform = Transform3D<f32, LayerPixel, DevicePixel>;

/// Rounded-corner bounds attached to an effect, carried through to the shared
/// quad state. The radius applies uniformly to all four corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundedCornerBounds<U> {
    pub rect: Rect<f32, U>,
    pub radius: f32,
}

/// Union of two update rects that ignores empty operands, so that an empty
/// rect at the origin never drags the union towards (0, 0).
pub fn union_update_rects(a: LayerIntRect, b: LayerIntRect) -> LayerIntRect {
    if a.is_empty() {
        return b;
    }
    if b.is_empty() {
        return a;
    }
    a.union(&b)
}

/// Componentwise `min(max(offset, min), max)`. Each axis clamps
/// independently.
pub fn clamp_offset(offset: ScrollOffset, min: ScrollOffset, max: ScrollOffset) -> ScrollOffset {
    ScrollOffset::new(
        offset.x.max(min.x).min(max.x),
        offset.y.max(min.y).min(max.y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_rect_does_not_pull_union_to_origin() {
        let accumulated = LayerIntRect::new(Point2D::new(40, 40), Size2D::new(10, 10));
        let empty = LayerIntRect::zero();
        assert_eq!(union_update_rects(accumulated, empty), accumulated);
        assert_eq!(union_update_rects(empty, accumulated), accumulated);
    }

    #[test]
    fn clamp_offset_is_componentwise() {
        let clamped = clamp_offset(
            ScrollOffset::new(-5.0, 500.0),
            ScrollOffset::zero(),
            ScrollOffset::new(100.0, 150.0),
        );
        assert_eq!(clamped, ScrollOffset::new(0.0, 150.0));
    }
}
