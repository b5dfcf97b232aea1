/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The pull half of the pipeline: derives draw-time values for a layer from
//! its property-tree indices and the current tree state.
//!
//! Every function here is a pure read of the trees. Calling one twice without
//! an intervening tree change returns identical results; nothing is cached
//! and nothing is mutated. The per-frame [`compute_draw_properties`] pass
//! materializes the results into each layer's `DrawProperties` for the quad
//! generation step to consume.

use base::id::LayerId;
use euclid::Transform3D;
use serde::{Deserialize, Serialize};

use crate::layer::Layer;
use crate::layer_tree::LayerTree;
use crate::property_tree::{BlendMode, PropertyTrees};
use crate::units::{
    DevicePixel, DeviceRect, LayerIntRect, LayerPixel, LayerRect, RoundedCornerBounds,
    ScreenTransform,
};

/// Identifier of a resource (for example a texture) owned by the embedder's
/// resource provider. Surface layers contribute one to their quads.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ResourceId(pub u32);

/// The seam to the embedder's resource provider; consumed only to validate
/// resource ids referenced by quads before a frame is handed off.
pub trait ResourceProvider {
    fn is_valid_resource(&self, id: ResourceId) -> bool;
}

/// Draw-time values for one layer, materialized once per frame on the active
/// tree.
#[derive(Clone, Debug)]
pub struct DrawProperties {
    /// Transform from layer space into the space of the layer's render
    /// target.
    pub target_space_transform: ScreenTransform,
    pub screen_space_transform: ScreenTransform,
    /// Opacity the layer draws with into its target. The target surface's own
    /// opacity is applied when the surface is composited.
    pub opacity: f32,
    pub screen_space_opacity: f32,
    pub is_clipped: bool,
    /// Accumulated clip in target space. Only meaningful when `is_clipped`.
    pub clip_rect: DeviceRect,
    /// The part of the layer inside every ancestor clip, in layer space.
    pub visible_layer_rect: LayerIntRect,
    pub rounded_corner_bounds: Option<RoundedCornerBounds<DevicePixel>>,
    pub is_fast_rounded_corner: bool,
}

impl Default for DrawProperties {
    fn default() -> Self {
        DrawProperties {
            target_space_transform: ScreenTransform::identity(),
            screen_space_transform: ScreenTransform::identity(),
            opacity: 1.0,
            screen_space_opacity: 1.0,
            is_clipped: false,
            clip_rect: DeviceRect::zero(),
            visible_layer_rect: LayerIntRect::zero(),
            rounded_corner_bounds: None,
            is_fast_rounded_corner: false,
        }
    }
}

/// The shared state stamped onto every quad a layer emits, consumed by the
/// render-pass builder.
#[derive(Clone, Debug)]
pub struct SharedQuadState {
    pub quad_to_target_transform: ScreenTransform,
    pub quad_layer_rect: LayerIntRect,
    pub visible_quad_layer_rect: LayerIntRect,
    pub rounded_corner_bounds: Option<RoundedCornerBounds<DevicePixel>>,
    pub clip_rect: DeviceRect,
    pub is_clipped: bool,
    pub are_contents_opaque: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Groups 3D-transformed siblings for back-to-front sorting.
    pub sorting_context_id: i32,
    pub is_fast_rounded_corner: bool,
}

/// The transform from `layer`'s space to screen space: the layer's offset to
/// its transform parent, then the transform node's accumulated screen
/// transform. Layers without a transform node sit directly in screen space.
pub fn screen_space_transform(layer: &Layer, trees: &PropertyTrees) -> ScreenTransform {
    let offset = layer.offset_to_transform_parent();
    let offset_transform =
        Transform3D::<f32, LayerPixel, LayerPixel>::translation(offset.x, offset.y, 0.0);
    if !layer.transform_tree_index().is_valid() {
        return offset_transform.with_destination::<DevicePixel>();
    }
    let node_to_screen = trees.transform_tree.to_screen(layer.transform_tree_index());
    offset_transform.then(&node_to_screen)
}

/// The inverse of the screen transform of `layer`'s render target surface, or
/// `None` when the layer has no valid effect chain or the surface transform
/// is degenerate.
fn target_from_screen(
    layer: &Layer,
    trees: &PropertyTrees,
) -> Option<Transform3D<f32, DevicePixel, LayerPixel>> {
    let target_effect = trees
        .effect_tree
        .render_surface_ancestor(layer.effect_tree_index());
    let surface = trees.effect_tree.node(target_effect)?;
    trees.transform_tree.to_screen(surface.transform_id).inverse()
}

/// The transform from `layer`'s space into the space of its render target.
/// When the surface transform cannot be inverted the screen-space transform
/// is the best remaining answer, not an error.
pub fn draw_transform(layer: &Layer, trees: &PropertyTrees) -> ScreenTransform {
    let to_screen = screen_space_transform(layer, trees);
    match target_from_screen(layer, trees) {
        Some(screen_to_target) => to_screen
            .then(&screen_to_target)
            .with_destination::<DevicePixel>(),
        None => to_screen,
    }
}

/// Intersects every clip on `layer`'s clip-tree ancestor chain, mapped into
/// screen space. `None` means the layer is unclipped. A clip whose transform
/// cannot map its rect clips everything.
fn accumulated_screen_clip(layer: &Layer, trees: &PropertyTrees) -> Option<DeviceRect> {
    let mut accumulated: Option<DeviceRect> = None;
    for node in trees.clip_tree.ancestors(layer.clip_tree_index()) {
        let to_screen = trees.transform_tree.to_screen(node.transform_id);
        let mapped = to_screen
            .outer_transformed_rect(&node.clip)
            .unwrap_or_else(DeviceRect::zero);
        accumulated = Some(match accumulated {
            Some(clip) => clip.intersection(&mapped).unwrap_or_else(DeviceRect::zero),
            None => mapped,
        });
    }
    accumulated
}

/// The part of `layer` inside every ancestor clip, in layer space. Unclipped
/// layers are fully visible; degenerate transforms make a layer invisible
/// rather than failing.
fn visible_layer_rect(
    layer: &Layer,
    to_screen: &ScreenTransform,
    screen_clip: Option<DeviceRect>,
) -> LayerIntRect {
    let bounds = LayerIntRect::from_size(layer.bounds());
    if bounds.is_empty() {
        return LayerIntRect::zero();
    }
    let Some(clip) = screen_clip else {
        return bounds;
    };

    let bounds_f = bounds.cast::<f32>();
    let Some(screen_bounds) = to_screen.outer_transformed_rect(&bounds_f) else {
        return LayerIntRect::zero();
    };
    let Some(visible_screen) = clip.intersection(&screen_bounds) else {
        return LayerIntRect::zero();
    };
    let Some(inverse) = to_screen.inverse() else {
        return LayerIntRect::zero();
    };
    let Some(visible) = inverse.outer_transformed_rect(&visible_screen) else {
        return LayerIntRect::zero();
    };
    match visible.intersection(&bounds_f) {
        Some(rect) => rect.round_out().cast::<i32>(),
        None => LayerIntRect::zero(),
    }
}

/// Maps the effect node's rounded-corner bounds into target space. The radius
/// scales with the x axis, which is exact for the translation and uniform
/// scale cases rounded corners occur in.
fn rounded_corner_bounds_in_target_space(
    layer: &Layer,
    trees: &PropertyTrees,
) -> (Option<RoundedCornerBounds<DevicePixel>>, bool) {
    let Some(effect) = trees.effect_tree.node(layer.effect_tree_index()) else {
        return (None, false);
    };
    let Some(bounds) = effect.rounded_corner_bounds else {
        return (None, false);
    };
    let to_screen = trees.transform_tree.to_screen(effect.transform_id);
    let to_target: ScreenTransform = match target_from_screen(layer, trees) {
        Some(screen_to_target) => to_screen
            .then(&screen_to_target)
            .with_destination::<DevicePixel>(),
        None => to_screen,
    };
    let Some(rect) = to_target.outer_transformed_rect(&bounds.rect) else {
        return (None, false);
    };
    let scale = crate::geometry::transform_2d_scale_components(&to_target, 1.0).x;
    (
        Some(RoundedCornerBounds {
            rect,
            radius: bounds.radius * scale,
        }),
        effect.is_fast_rounded_corner,
    )
}

/// Resolves the full set of draw properties for one layer.
pub fn resolve_draw_properties(layer: &Layer, trees: &PropertyTrees) -> DrawProperties {
    let to_screen = screen_space_transform(layer, trees);
    let screen_clip = accumulated_screen_clip(layer, trees);
    let clip_rect_in_target = screen_clip
        .and_then(|clip| {
            target_from_screen(layer, trees)
                .and_then(|inverse| inverse.outer_transformed_rect(&clip))
        })
        .map(|rect| rect.cast_unit::<DevicePixel>());
    let (rounded_corner_bounds, is_fast_rounded_corner) =
        rounded_corner_bounds_in_target_space(layer, trees);

    DrawProperties {
        target_space_transform: draw_transform(layer, trees),
        screen_space_transform: to_screen,
        opacity: trees.effect_tree.draw_opacity(layer.effect_tree_index()),
        screen_space_opacity: trees
            .effect_tree
            .screen_space_opacity(layer.effect_tree_index()),
        is_clipped: screen_clip.is_some(),
        clip_rect: clip_rect_in_target
            .or(screen_clip)
            .unwrap_or_else(DeviceRect::zero),
        visible_layer_rect: visible_layer_rect(layer, &to_screen, screen_clip),
        rounded_corner_bounds,
        is_fast_rounded_corner,
    }
}

/// The per-frame resolver pass: materializes draw properties for every layer
/// of `tree` and clears the tree's needs-update flag.
pub fn compute_draw_properties(tree: &mut LayerTree) {
    let resolved: Vec<(LayerId, DrawProperties)> = tree
        .layers()
        .map(|layer| (layer.id(), resolve_draw_properties(layer, &tree.state.property_trees)))
        .collect();
    for (id, properties) in resolved {
        if let Some((layer, _)) = tree.layer_mut(id) {
            layer.draw_properties = properties;
        }
    }
    tree.state.clear_needs_update_draw_properties();
}
