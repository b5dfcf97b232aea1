/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A single paintable or scrollable unit of the scene graph.
//!
//! A layer owns only its layer-local state: bounds, flags, debug info, and
//! four integer indices into the owning tree's property trees. Geometry is
//! always derived by combining those indices with tree state; nothing derived
//! is stored here except the per-frame `DrawProperties` snapshot the resolver
//! pass writes.
//!
//! Mutators short-circuit on value equality. A redundant write never sets a
//! dirty flag and never invalidates anything downstream.

use base::id::{ClipNodeId, EffectNodeId, ElementId, LayerId, ScrollNodeId, TransformNodeId};
use euclid::{Size2D, Transform3D};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::draw_properties::{
    self, DrawProperties, ResourceId, ResourceProvider, SharedQuadState,
};
use crate::geometry::{approximate_max_scale, has_perspective, map_enclosing_clipped_rect,
    transform_2d_scale_components};
use crate::layer_tree::LayerTreeState;
use crate::property_tree::{BlendMode, PropertyTrees};
use crate::units::{
    DeviceIntRect, LayerIntRect, LayerIntSize, LayerPixel, LayerVector2D, ScreenTransform,
    ScrollOffset, union_update_rects,
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ScrollbarOrientation {
    Horizontal,
    Vertical,
}

/// The closed set of layer kinds. Shared state lives on [`Layer`]; each
/// variant carries only what that kind needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerKind {
    /// A layer painted from rasterized content.
    Content,
    /// A scrollbar belonging to some scrollable layer.
    Scrollbar { orientation: ScrollbarOrientation },
    /// A layer whose content is an embedder-provided resource.
    Surface { resource: ResourceId },
}

impl LayerKind {
    pub fn is_scrollbar(&self) -> bool {
        matches!(self, LayerKind::Scrollbar { .. })
    }

    pub fn is_surface(&self) -> bool {
        matches!(self, LayerKind::Surface { .. })
    }

    fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Content => "ContentLayer",
            LayerKind::Scrollbar { .. } => "ScrollbarLayer",
            LayerKind::Surface { .. } => "SurfaceLayer",
        }
    }
}

/// The layer's two change-tracking bits.
///
/// `changed_direct` is set by direct mutators such as `set_bounds`;
/// `changed_from_trees` when the property trees mark the layer's nodes dirty.
/// The only way to clear either is [`ChangeFlags::reset`], which clears both,
/// so the two can never go out of sync across a commit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChangeFlags {
    changed_direct: bool,
    changed_from_trees: bool,
}

impl ChangeFlags {
    pub fn note_direct(&mut self) {
        self.changed_direct = true;
    }

    pub fn note_from_trees(&mut self) {
        self.changed_from_trees = true;
    }

    pub fn changed_direct(self) -> bool {
        self.changed_direct
    }

    pub fn changed_from_trees(self) -> bool {
        self.changed_from_trees
    }

    pub fn any(self) -> bool {
        self.changed_direct || self.changed_from_trees
    }

    /// Clears both flags together, exactly once per commit cycle.
    pub fn reset(&mut self) {
        *self = ChangeFlags::default();
    }
}

/// One recorded invalidation, kept for the debug sink until the layer draws.
#[derive(Clone, Debug)]
pub struct InvalidationInfo {
    pub rect: LayerIntRect,
    pub reason: String,
    pub client: String,
}

/// Diagnostic state attached by the embedder; no behavioral contract.
#[derive(Clone, Debug, Default)]
pub struct LayerDebugInfo {
    pub name: String,
    pub owner_node_id: Option<u64>,
    pub compositing_reasons: Vec<String>,
    pub invalidations: Vec<InvalidationInfo>,
}

/// Cross-commit bookkeeping for jitter measurement.
#[derive(Clone, Debug)]
pub struct PerformanceProperties {
    pub translation_from_last_frame: f32,
    pub last_commit_screen_space_transform: ScreenTransform,
    pub num_fixed_point_hits: i32,
}

impl Default for PerformanceProperties {
    fn default() -> Self {
        PerformanceProperties {
            translation_from_last_frame: 0.0,
            last_commit_screen_space_transform: ScreenTransform::identity(),
            num_fixed_point_hits: 0,
        }
    }
}

pub struct Layer {
    id: LayerId,
    element_id: Option<ElementId>,
    kind: LayerKind,

    bounds: LayerIntSize,
    offset_to_transform_parent: LayerVector2D,
    /// Invalidated region accumulated since the last commit; unioned into the
    /// active layer's rect at push time, then reset.
    update_rect: LayerIntRect,

    transform_tree_index: TransformNodeId,
    effect_tree_index: EffectNodeId,
    clip_tree_index: ClipNodeId,
    scroll_tree_index: ScrollNodeId,

    draws_content: bool,
    contents_opaque: bool,
    hit_testable: bool,
    scrollable: bool,
    scroll_container_bounds: LayerIntSize,
    has_will_change_transform_hint: bool,

    non_fast_scrollable_region: Vec<LayerIntRect>,
    wheel_event_handler_region: Vec<LayerIntRect>,

    change: ChangeFlags,
    needs_push_properties: bool,

    debug_info: Option<LayerDebugInfo>,
    pub(crate) draw_properties: DrawProperties,
    pub(crate) performance: PerformanceProperties,
}

impl Layer {
    pub fn new(id: LayerId, kind: LayerKind) -> Self {
        assert!(id.0 > 0, "layer ids are positive");
        Layer {
            id,
            element_id: None,
            kind,
            bounds: LayerIntSize::zero(),
            offset_to_transform_parent: LayerVector2D::zero(),
            update_rect: LayerIntRect::zero(),
            transform_tree_index: TransformNodeId::INVALID,
            effect_tree_index: EffectNodeId::INVALID,
            clip_tree_index: ClipNodeId::INVALID,
            scroll_tree_index: ScrollNodeId::INVALID,
            draws_content: false,
            contents_opaque: false,
            hit_testable: false,
            scrollable: false,
            scroll_container_bounds: LayerIntSize::zero(),
            has_will_change_transform_hint: false,
            non_fast_scrollable_region: Vec::new(),
            wheel_event_handler_region: Vec::new(),
            change: ChangeFlags::default(),
            needs_push_properties: false,
            debug_info: None,
            draw_properties: DrawProperties::default(),
            performance: PerformanceProperties::default(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn element_id(&self) -> Option<ElementId> {
        self.element_id
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn bounds(&self) -> LayerIntSize {
        self.bounds
    }

    pub fn offset_to_transform_parent(&self) -> LayerVector2D {
        self.offset_to_transform_parent
    }

    pub fn update_rect(&self) -> LayerIntRect {
        self.update_rect
    }

    pub fn draws_content(&self) -> bool {
        self.draws_content
    }

    pub fn contents_opaque(&self) -> bool {
        self.contents_opaque
    }

    pub fn scrollable(&self) -> bool {
        self.scrollable
    }

    pub fn scroll_container_bounds(&self) -> LayerIntSize {
        self.scroll_container_bounds
    }

    pub fn has_will_change_transform_hint(&self) -> bool {
        self.has_will_change_transform_hint
    }

    pub fn change_flags(&self) -> ChangeFlags {
        self.change
    }

    pub fn needs_push_properties(&self) -> bool {
        self.needs_push_properties
    }

    pub fn transform_tree_index(&self) -> TransformNodeId {
        self.transform_tree_index
    }

    pub fn effect_tree_index(&self) -> EffectNodeId {
        self.effect_tree_index
    }

    pub fn clip_tree_index(&self) -> ClipNodeId {
        self.clip_tree_index
    }

    pub fn scroll_tree_index(&self) -> ScrollNodeId {
        self.scroll_tree_index
    }

    pub fn set_transform_tree_index(&mut self, index: TransformNodeId) {
        self.transform_tree_index = index;
    }

    pub fn set_effect_tree_index(&mut self, index: EffectNodeId) {
        self.effect_tree_index = index;
    }

    pub fn set_clip_tree_index(&mut self, index: ClipNodeId) {
        self.clip_tree_index = index;
    }

    pub fn set_scroll_tree_index(&mut self, index: ScrollNodeId) {
        self.scroll_tree_index = index;
    }

    pub fn draw_properties(&self) -> &DrawProperties {
        &self.draw_properties
    }

    pub fn visible_layer_rect(&self) -> LayerIntRect {
        self.draw_properties.visible_layer_rect
    }

    /// Marks the layer changed by a direct mutation and schedules a
    /// draw-properties update.
    fn note_property_changed(&mut self, tree: &mut LayerTreeState) {
        self.change.note_direct();
        tree.set_needs_update_draw_properties();
        self.set_needs_push_properties(tree);
    }

    /// Marks the layer changed on behalf of the property trees.
    pub fn note_property_changed_from_trees(&mut self, tree: &mut LayerTreeState) {
        self.change.note_from_trees();
        tree.set_needs_update_draw_properties();
        self.set_needs_push_properties(tree);
    }

    /// Schedules this layer for the next push-properties pass. A no-op on the
    /// active tree, which is only ever pushed into.
    pub fn set_needs_push_properties(&mut self, tree: &mut LayerTreeState) {
        if tree.is_active() {
            return;
        }
        if !self.needs_push_properties {
            self.needs_push_properties = true;
            tree.add_layer_should_push_properties(self.id);
        }
    }

    pub fn set_bounds(&mut self, bounds: LayerIntSize, tree: &mut LayerTreeState) {
        if self.bounds == bounds {
            return;
        }
        self.bounds = bounds;

        // Scrollbar positions depend on the scrolling layer bounds.
        if self.scrollable {
            tree.set_scrollbar_geometries_need_update();
        }

        self.note_property_changed(tree);
    }

    /// Makes the layer scrollable with the given container bounds. Idempotent
    /// when already scrollable with identical bounds. The first transition to
    /// scrollable registers the layer with the tree's scrollable-layer index.
    pub fn set_scrollable(&mut self, container_bounds: LayerIntSize, tree: &mut LayerTreeState) {
        if self.scrollable && self.scroll_container_bounds == container_bounds {
            return;
        }

        let was_scrollable = self.scrollable;
        self.scrollable = true;
        self.scroll_container_bounds = container_bounds;

        tree.set_scrollbar_geometries_need_update();
        if !was_scrollable {
            tree.add_scrollable_layer(self.id);
        }

        self.note_property_changed(tree);
    }

    pub fn set_draws_content(&mut self, draws_content: bool, tree: &mut LayerTreeState) {
        if self.draws_content == draws_content {
            return;
        }
        self.draws_content = draws_content;
        self.note_property_changed(tree);
    }

    pub fn set_hit_testable(&mut self, hit_testable: bool, tree: &mut LayerTreeState) {
        if self.hit_testable == hit_testable {
            return;
        }
        self.hit_testable = hit_testable;
        self.note_property_changed(tree);
    }

    pub fn set_contents_opaque(&mut self, opaque: bool, tree: &mut LayerTreeState) {
        if self.contents_opaque == opaque {
            return;
        }
        self.contents_opaque = opaque;
        self.note_property_changed(tree);
    }

    pub fn set_offset_to_transform_parent(
        &mut self,
        offset: LayerVector2D,
        tree: &mut LayerTreeState,
    ) {
        if self.offset_to_transform_parent == offset {
            return;
        }
        self.offset_to_transform_parent = offset;
        self.note_property_changed(tree);
    }

    pub fn set_has_will_change_transform_hint(&mut self, has_hint: bool) {
        self.has_will_change_transform_hint = has_hint;
    }

    pub fn set_non_fast_scrollable_region(
        &mut self,
        region: Vec<LayerIntRect>,
        tree: &mut LayerTreeState,
    ) {
        if self.non_fast_scrollable_region == region {
            return;
        }
        self.non_fast_scrollable_region = region;
        self.set_needs_push_properties(tree);
    }

    pub fn set_wheel_event_handler_region(
        &mut self,
        region: Vec<LayerIntRect>,
        tree: &mut LayerTreeState,
    ) {
        if self.wheel_event_handler_region == region {
            return;
        }
        self.wheel_event_handler_region = region;
        self.set_needs_push_properties(tree);
    }

    /// Re-keys the layer in the tree's element index. The element id is set
    /// before anything that depends on it.
    pub fn set_element_id(&mut self, element_id: Option<ElementId>, tree: &mut LayerTreeState) {
        if self.element_id == element_id {
            return;
        }
        tree.remove_from_element_layer_list(self.element_id);
        self.element_id = element_id;
        tree.add_to_element_layer_list(self.element_id, self.id);
        self.set_needs_push_properties(tree);
    }

    /// Accumulates an invalidated region. Reset when properties are pushed.
    pub fn union_update_rect(&mut self, update_rect: LayerIntRect) {
        self.update_rect = union_update_rects(self.update_rect, update_rect);
    }

    /// Whether anything about this layer changed since the last commit,
    /// either directly or through the property trees.
    pub fn layer_property_changed(&self, trees: &PropertyTrees) -> bool {
        self.change.changed_direct() || self.layer_property_changed_from_trees(trees)
    }

    pub fn layer_property_changed_from_trees(&self, trees: &PropertyTrees) -> bool {
        if self.change.changed_from_trees() || trees.full_tree_damaged {
            return true;
        }
        if let Some(node) = trees.transform_tree.node(self.transform_tree_index) {
            if node.transform_changed {
                return true;
            }
        }
        if let Some(node) = trees.effect_tree.node(self.effect_tree_index) {
            if node.effect_changed {
                return true;
            }
        }
        false
    }

    /// Clears all per-commit state: both change flags (atomically), the
    /// push-needed bit, the update rect, and accumulated debug invalidations.
    pub fn reset_change_tracking(&mut self) {
        self.change.reset();
        self.needs_push_properties = false;
        self.update_rect = LayerIntRect::zero();
        if let Some(debug_info) = &mut self.debug_info {
            debug_info.invalidations.clear();
        }
    }

    /// One-directional copy of all layer-local state onto this layer's
    /// active-tree counterpart, at most once per commit per layer.
    ///
    /// The target's needs-redraw signal is raised only when the source
    /// carried a change flag. Afterwards the source's change tracking is
    /// cleared and its update rect is empty; a second push with no
    /// intervening mutation is a no-op on all shared fields.
    pub fn push_properties_to(
        &mut self,
        target: &mut Layer,
        target_state: &mut LayerTreeState,
    ) {
        debug_assert!(target_state.is_active());
        debug_assert_eq!(self.id, target.id);
        log::trace!("pushing properties for {}", self.id);

        // The element id is pushed first because other fields key off it.
        target.set_element_id(self.element_id, target_state);

        target.offset_to_transform_parent = self.offset_to_transform_parent;
        target.contents_opaque = self.contents_opaque;
        target.draws_content = self.draws_content;
        target.hit_testable = self.hit_testable;
        target.non_fast_scrollable_region = self.non_fast_scrollable_region.clone();
        target.wheel_event_handler_region = self.wheel_event_handler_region.clone();
        target.transform_tree_index = self.transform_tree_index;
        target.effect_tree_index = self.effect_tree_index;
        target.clip_tree_index = self.clip_tree_index;
        target.scroll_tree_index = self.scroll_tree_index;
        target.has_will_change_transform_hint = self.has_will_change_transform_hint;
        target.kind = self.kind;

        if self.change.any() {
            target_state.set_needs_update_draw_properties();
        }
        if self.change.changed_direct() {
            target.change.note_direct();
        }
        if self.change.changed_from_trees() {
            target.change.note_from_trees();
        }

        target.set_bounds(self.bounds, target_state);
        if self.scrollable {
            target.set_scrollable(self.scroll_container_bounds, target_state);
        }

        target.union_update_rect(self.update_rect);
        target.update_debug_info(self.debug_info.as_ref());

        self.reset_change_tracking();
    }

    /// Replaces the diagnostic state, accumulating invalidation records until
    /// the layer draws. `None` means collection has stopped.
    pub fn update_debug_info(&mut self, debug_info: Option<&LayerDebugInfo>) {
        let Some(new_info) = debug_info else {
            self.debug_info = None;
            return;
        };
        match &mut self.debug_info {
            None => self.debug_info = Some(new_info.clone()),
            Some(existing) => {
                let mut merged = new_info.clone();
                let mut invalidations = std::mem::take(&mut existing.invalidations);
                invalidations.extend(merged.invalidations);
                merged.invalidations = invalidations;
                self.debug_info = Some(merged);
            },
        }
    }

    pub fn debug_name(&self) -> &str {
        self.debug_info
            .as_ref()
            .map_or("", |debug_info| debug_info.name.as_str())
    }

    /// Whether the layer participates in hit testing. The flag is further
    /// gated by the effect tree: a hidden subtree is never hit testable.
    pub fn hit_testable(&self, trees: &PropertyTrees) -> bool {
        let mut hit_testable = self.hit_testable;
        if let Some(node) = trees.effect_tree.node(self.effect_tree_index) {
            hit_testable &= !node.subtree_hidden;
        }
        hit_testable
    }

    pub fn opacity(&self, trees: &PropertyTrees) -> f32 {
        trees
            .effect_tree
            .node(self.effect_tree_index)
            .map_or(1.0, |node| node.opacity)
    }

    pub fn is_affected_by_page_scale(&self, trees: &PropertyTrees) -> bool {
        trees
            .transform_tree
            .node(self.transform_tree_index)
            .is_some_and(|node| node.in_subtree_of_page_scale_node)
    }

    pub fn sorting_context_id(&self, trees: &PropertyTrees) -> i32 {
        trees
            .transform_tree
            .node(self.transform_tree_index)
            .map_or(0, |node| node.sorting_context_id)
    }

    pub fn is_3d_sorted(&self, trees: &PropertyTrees) -> bool {
        self.sorting_context_id(trees) != 0
    }

    /// The current scroll offset of the scroll-tree node this layer scrolls,
    /// keyed by the layer's element id.
    pub fn current_scroll_offset(&self, trees: &PropertyTrees) -> ScrollOffset {
        self.element_id.map_or_else(ScrollOffset::zero, |element| {
            trees.scroll_tree.current_scroll_offset(element)
        })
    }

    /// Stores a new scroll offset. Only notifies the tree when the stored
    /// value actually changes.
    pub fn set_current_scroll_offset(&mut self, offset: ScrollOffset, tree: &mut LayerTreeState) {
        debug_assert!(tree.is_active());
        let Some(element) = self.element_id else {
            return;
        };
        if tree.property_trees.scroll_tree.set_scroll_offset(element, offset) {
            tree.did_update_scroll_offset(self.scroll_tree_index, offset);
        }
    }

    pub fn max_scroll_offset(&self, trees: &PropertyTrees) -> ScrollOffset {
        trees.scroll_tree.max_scroll_offset(self.scroll_tree_index)
    }

    /// Componentwise clamp of `offset` into `[0, max_scroll_offset]`.
    pub fn clamp_scroll_offset_to_limits(
        &self,
        offset: ScrollOffset,
        trees: &PropertyTrees,
    ) -> ScrollOffset {
        trees
            .scroll_tree
            .clamp_scroll_offset(self.scroll_tree_index, offset)
    }

    /// Applies a scroll delta, clamped to the node's range, and returns the
    /// unconsumed remainder.
    pub fn scroll_by(&mut self, delta: LayerVector2D, tree: &mut LayerTreeState) -> LayerVector2D {
        let update = tree
            .property_trees
            .scroll_tree
            .scroll_by(self.scroll_tree_index, delta);
        if update.offset_changed {
            let offset = self.current_scroll_offset(&tree.property_trees);
            tree.did_update_scroll_offset(self.scroll_tree_index, offset);
        }
        update.unconsumed
    }

    /// Re-clamps the current offset after a bounds change and returns the
    /// correction that was applied.
    pub fn clamp_scroll_to_max_scroll_offset(
        &mut self,
        tree: &mut LayerTreeState,
    ) -> LayerVector2D {
        let old_offset = self.current_scroll_offset(&tree.property_trees);
        let clamped = self.clamp_scroll_offset_to_limits(old_offset, &tree.property_trees);
        let delta = clamped - old_offset;
        if delta != LayerVector2D::zero() {
            self.scroll_by(delta, tree);
        }
        delta
    }

    /// The transform into the layer's render-target space, derived from tree
    /// state on every call.
    pub fn draw_transform(&self, trees: &PropertyTrees) -> ScreenTransform {
        draw_properties::draw_transform(self, trees)
    }

    /// The transform into screen space, derived from tree state on every
    /// call.
    pub fn screen_space_transform(&self, trees: &PropertyTrees) -> ScreenTransform {
        draw_properties::screen_space_transform(self, trees)
    }

    /// The scale to rasterize this layer's content at.
    ///
    /// Perspective transforms get an approximate maximum scale, capped so the
    /// layer needs at most `max_tiles_to_cover_layer_dimension` default tiles
    /// per dimension, rounded to an integer to avoid jitter under animation,
    /// and floored at the page-by-device scale. Everything else derives
    /// per-axis scales and caps their ratio.
    pub fn ideal_contents_scale(&self, tree: &LayerTreeState) -> f32 {
        let page_scale = if self.is_affected_by_page_scale(&tree.property_trees) {
            tree.current_page_scale_factor()
        } else {
            1.0
        };
        let default_scale = page_scale * tree.device_scale_factor();

        let transform = self.screen_space_transform(&tree.property_trees);
        if has_perspective(&transform) {
            if self.bounds.is_empty() {
                return default_scale;
            }
            let mut scale = approximate_max_scale(&transform);

            let tile_size = tree.settings.default_tile_size;
            let max_tiles = tree.settings.max_tiles_to_cover_layer_dimension;
            let scale_cap = f32::min(
                ((tile_size.width - 2) * max_tiles) as f32 / self.bounds.width as f32,
                ((tile_size.height - 2) * max_tiles) as f32 / self.bounds.height as f32,
            );
            scale = scale.min(scale_cap);

            // The scale is an approximation anyway; an integer value keeps it
            // from drifting every frame of an animation.
            scale = scale.round();

            return scale.max(default_scale);
        }

        let scales = transform_2d_scale_components(&transform, default_scale);
        Self::preferred_raster_scale(scales, tree.settings.max_raster_scale_ratio)
    }

    /// Collapses per-axis raster scales to one value, capping the anisotropy
    /// at `max_scale_ratio`.
    pub fn preferred_raster_scale(
        raster_space_scale_factor: euclid::default::Vector2D<f32>,
        max_scale_ratio: f32,
    ) -> f32 {
        let lower = raster_space_scale_factor
            .x
            .min(raster_space_scale_factor.y);
        let higher = raster_space_scale_factor
            .x
            .max(raster_space_scale_factor.y);
        f32::min(max_scale_ratio * lower, higher)
    }

    /// Whether this layer's text can be rendered with subpixel antialiasing.
    pub fn can_use_lcd_text(&self, tree: &LayerTreeState) -> bool {
        if tree.settings.layers_always_allowed_lcd_text {
            return true;
        }
        if !tree.settings.can_use_lcd_text {
            return false;
        }
        if !self.contents_opaque {
            return false;
        }

        let trees = &tree.property_trees;
        if trees.effect_tree.screen_space_opacity(self.effect_tree_index) != 1.0 {
            return false;
        }
        if !trees
            .transform_tree
            .has_only_integer_translations(self.transform_tree_index)
        {
            return false;
        }
        if self.offset_to_transform_parent.x.fract() != 0.0 ||
            self.offset_to_transform_parent.y.fract() != 0.0
        {
            return false;
        }
        if self.has_will_change_transform_hint {
            return false;
        }
        true
    }

    /// Fills the shared quad state for this layer's quads from the
    /// materialized draw properties. A layer that owns a render surface
    /// always composites source-over; the surface applies the blend mode.
    pub fn populate_shared_quad_state(
        &self,
        trees: &PropertyTrees,
        contents_opaque: bool,
    ) -> SharedQuadState {
        let blend_mode = match trees.effect_tree.node(self.effect_tree_index) {
            Some(node) if node.has_render_surface => BlendMode::SourceOver,
            Some(node) => node.blend_mode,
            None => BlendMode::SourceOver,
        };
        SharedQuadState {
            quad_to_target_transform: self.draw_properties.target_space_transform,
            quad_layer_rect: LayerIntRect::from_size(self.bounds),
            visible_quad_layer_rect: self.draw_properties.visible_layer_rect,
            rounded_corner_bounds: self.draw_properties.rounded_corner_bounds,
            clip_rect: self.draw_properties.clip_rect,
            is_clipped: self.draw_properties.is_clipped,
            are_contents_opaque: contents_opaque,
            opacity: self.draw_properties.opacity,
            blend_mode,
            sorting_context_id: self.sorting_context_id(trees),
            is_fast_rounded_corner: self.draw_properties.is_fast_rounded_corner,
        }
    }

    /// Like [`Self::populate_shared_quad_state`], for layers rasterized at a
    /// scale other than 1: content rects grow by the scale and the transform
    /// shrinks to compensate.
    pub fn populate_scaled_shared_quad_state(
        &self,
        trees: &PropertyTrees,
        layer_to_content_scale: f32,
        contents_opaque: bool,
    ) -> SharedQuadState {
        let scaled_bounds = scale_size_ceiled(self.bounds, layer_to_content_scale);
        let scaled_bounds_rect = LayerIntRect::from_size(scaled_bounds);
        let scaled_visible = scale_rect_enclosing(
            self.draw_properties.visible_layer_rect,
            layer_to_content_scale,
        )
        .intersection(&scaled_bounds_rect)
        .unwrap_or_else(LayerIntRect::zero);

        let inverse_scale = 1.0 / layer_to_content_scale;
        let scaled_draw_transform =
            Transform3D::<f32, LayerPixel, LayerPixel>::scale(inverse_scale, inverse_scale, 1.0)
                .then(&self.draw_properties.target_space_transform);

        let mut state = self.populate_shared_quad_state(trees, contents_opaque);
        state.quad_to_target_transform = scaled_draw_transform;
        state.quad_layer_rect = scaled_bounds_rect;
        state.visible_quad_layer_rect = scaled_visible;
        state
    }

    /// The smallest target-space rect covering the transformed layer bounds.
    pub fn enclosing_rect_in_target_space(&self, trees: &PropertyTrees) -> DeviceIntRect {
        map_enclosing_clipped_rect(
            &self.draw_transform(trees),
            LayerIntRect::from_size(self.bounds).cast::<f32>(),
        )
    }

    /// As [`Self::enclosing_rect_in_target_space`], for content rasterized at
    /// `scale`.
    pub fn scaled_enclosing_rect_in_target_space(
        &self,
        trees: &PropertyTrees,
        scale: f32,
    ) -> DeviceIntRect {
        let inverse_scale = 1.0 / scale;
        let scaled_draw_transform =
            Transform3D::<f32, LayerPixel, LayerPixel>::scale(inverse_scale, inverse_scale, 1.0)
                .then(&self.draw_transform(trees));
        let scaled_bounds = scale_size_ceiled(self.bounds, scale);
        map_enclosing_clipped_rect(
            &scaled_draw_transform,
            LayerIntRect::from_size(scaled_bounds).cast::<f32>(),
        )
    }

    /// Checks that every resource this layer references is still valid with
    /// the embedder's resource provider. Contract violations fail fast.
    pub fn validate_quad_resources(&self, provider: &dyn ResourceProvider) {
        if let LayerKind::Surface { resource } = self.kind {
            debug_assert!(
                provider.is_valid_resource(resource),
                "surface layer references an invalid resource"
            );
        }
    }

    /// A structured dump of the layer for the tracing/debug sink.
    pub fn as_json(&self, tree: &LayerTreeState) -> serde_json::Value {
        let trees = &tree.property_trees;
        let scroll_offset = self.current_scroll_offset(trees);
        let mut value = json!({
            "LayerId": self.id.0,
            "LayerType": self.kind.type_name(),
            "Bounds": [self.bounds.width, self.bounds.height],
            "OffsetToTransformParent": [
                self.offset_to_transform_parent.x,
                self.offset_to_transform_parent.y,
            ],
            "DrawsContent": self.draws_content,
            "HitTestable": self.hit_testable,
            "Is3dSorted": self.is_3d_sorted(trees),
            "Opacity": self.opacity(trees),
            "ContentsOpaque": self.contents_opaque,
            "HasWillChangeTransformHint": self.has_will_change_transform_hint,
            "transform_tree_index": index_as_json(self.transform_tree_index.0),
            "clip_tree_index": index_as_json(self.clip_tree_index.0),
            "effect_tree_index": index_as_json(self.effect_tree_index.0),
            "scroll_tree_index": index_as_json(self.scroll_tree_index.0),
            "scroll_offset": [scroll_offset.x, scroll_offset.y],
        });

        let map = value.as_object_mut().unwrap();
        if let Some(element) = self.element_id {
            map.insert("ElementId".into(), json!(element.0));
        }
        if self.scrollable {
            map.insert("Scrollable".into(), json!(true));
        }
        if !self.non_fast_scrollable_region.is_empty() {
            map.insert(
                "NonFastScrollableRegion".into(),
                region_as_json(&self.non_fast_scrollable_region),
            );
        }
        if !self.wheel_event_handler_region.is_empty() {
            map.insert(
                "WheelRegion".into(),
                region_as_json(&self.wheel_event_handler_region),
            );
        }
        if let Some(debug_info) = &self.debug_info {
            map.insert("DebugName".into(), json!(debug_info.name));
            if let Some(owner) = debug_info.owner_node_id {
                map.insert("OwnerNode".into(), json!(owner));
            }
            if !debug_info.compositing_reasons.is_empty() {
                map.insert(
                    "CompositingReasons".into(),
                    json!(debug_info.compositing_reasons),
                );
            }
        }
        value
    }
}

#[cfg(test)]
impl Layer {
    pub(crate) fn set_bounds_for_testing(&mut self, bounds: LayerIntSize) {
        self.bounds = bounds;
    }

    pub(crate) fn set_offset_to_transform_parent_for_testing(&mut self, offset: LayerVector2D) {
        self.offset_to_transform_parent = offset;
    }

    pub(crate) fn set_element_id_for_testing(&mut self, element_id: Option<ElementId>) {
        self.element_id = element_id;
    }
}

fn index_as_json(index: usize) -> serde_json::Value {
    if index == usize::MAX {
        json!(-1)
    } else {
        json!(index)
    }
}

fn region_as_json(region: &[LayerIntRect]) -> serde_json::Value {
    let rects: Vec<[i32; 4]> = region
        .iter()
        .map(|rect| {
            [
                rect.origin.x,
                rect.origin.y,
                rect.size.width,
                rect.size.height,
            ]
        })
        .collect();
    json!(rects)
}

fn scale_size_ceiled(size: LayerIntSize, scale: f32) -> LayerIntSize {
    Size2D::new(
        (size.width as f32 * scale).ceil() as i32,
        (size.height as f32 * scale).ceil() as i32,
    )
}

fn scale_rect_enclosing(rect: LayerIntRect, scale: f32) -> LayerIntRect {
    rect.cast::<f32>().scale(scale, scale).round_out().cast::<i32>()
}

#[cfg(test)]
mod tests {
    use euclid::default::Vector2D as UntypedVector2D;

    use super::*;

    #[test]
    fn preferred_raster_scale_caps_anisotropy() {
        let ratio = 5.0;
        assert_eq!(
            Layer::preferred_raster_scale(UntypedVector2D::new(10.0, 1.0), ratio),
            5.0
        );
        // The higher axis wins uncapped when within the ratio of the lower.
        assert_eq!(
            Layer::preferred_raster_scale(UntypedVector2D::new(2.0, 3.0), ratio),
            3.0
        );
        assert_eq!(
            Layer::preferred_raster_scale(UntypedVector2D::new(4.0, 4.0), ratio),
            4.0
        );
    }

    #[test]
    fn change_flags_reset_clears_both() {
        let mut flags = ChangeFlags::default();
        flags.note_direct();
        flags.note_from_trees();
        assert!(flags.any());
        flags.reset();
        assert!(!flags.changed_direct());
        assert!(!flags.changed_from_trees());
    }

    #[test]
    #[should_panic(expected = "positive")]
    fn zero_layer_id_is_rejected() {
        let _ = Layer::new(LayerId(0), LayerKind::Content);
    }

    #[test]
    fn update_debug_info_accumulates_invalidations() {
        let mut layer = Layer::new(LayerId(1), LayerKind::Content);
        let mut first = LayerDebugInfo::default();
        first.name = "content".into();
        first.invalidations.push(InvalidationInfo {
            rect: LayerIntRect::from_size(LayerIntSize::new(4, 4)),
            reason: "paint".into(),
            client: "test".into(),
        });
        layer.update_debug_info(Some(&first));

        let mut second = LayerDebugInfo::default();
        second.name = "content".into();
        second.invalidations.push(InvalidationInfo {
            rect: LayerIntRect::from_size(LayerIntSize::new(8, 8)),
            reason: "scroll".into(),
            client: "test".into(),
        });
        layer.update_debug_info(Some(&second));

        let info = layer.debug_info.as_ref().unwrap();
        assert_eq!(info.invalidations.len(), 2);
        assert_eq!(info.invalidations[0].reason, "paint");

        layer.update_debug_info(None);
        assert!(layer.debug_info.is_none());
    }
}
