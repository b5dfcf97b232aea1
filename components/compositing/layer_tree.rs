/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The layer-tree container and the double-buffered pending/active pair.
//!
//! Two `LayerTree` instances exist at a time: the pending tree receives
//! mutations, the active tree is drawn from. Each side is only ever touched
//! by its own context; the one-shot property push during
//! [`LayerTreeHost::commit`] is the sole synchronization point and expects
//! both trees otherwise quiesced.

use base::id::{ElementId, LayerId, ScrollNodeId};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::geometry::{approximately_equal, to_2d_translation};
use crate::layer::Layer;
use crate::property_tree::PropertyTrees;
use crate::settings::CompositorSettings;
use crate::units::{ScreenTransform, ScrollOffset};

/// Which half of the double buffer a tree is. This is the single authority
/// for "may this instance be drawn from"; it is never inferred.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TreeKind {
    Pending,
    Active,
}

/// Tree-wide state shared by all layers of one `LayerTree`: the property
/// trees, settings, registries, and the dirty flags raised by layer mutators.
///
/// Kept separate from the layer map so a layer and the tree state can be
/// borrowed together; every layer mutator takes `&mut LayerTreeState`.
pub struct LayerTreeState {
    kind: TreeKind,
    pub property_trees: PropertyTrees,
    pub settings: CompositorSettings,
    device_scale_factor: f32,
    current_page_scale_factor: f32,
    needs_update_draw_properties: bool,
    scrollbar_geometries_need_update: bool,
    scrollable_layers: FxHashSet<LayerId>,
    element_to_layer: FxHashMap<ElementId, LayerId>,
    layers_that_should_push_properties: FxHashSet<LayerId>,
}

impl LayerTreeState {
    fn new(kind: TreeKind, settings: CompositorSettings) -> Self {
        LayerTreeState {
            kind,
            property_trees: PropertyTrees::new(),
            settings,
            device_scale_factor: 1.0,
            current_page_scale_factor: 1.0,
            needs_update_draw_properties: false,
            scrollbar_geometries_need_update: false,
            scrollable_layers: FxHashSet::default(),
            element_to_layer: FxHashMap::default(),
            layers_that_should_push_properties: FxHashSet::default(),
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.kind == TreeKind::Active
    }

    pub fn needs_update_draw_properties(&self) -> bool {
        self.needs_update_draw_properties
    }

    pub fn set_needs_update_draw_properties(&mut self) {
        self.needs_update_draw_properties = true;
    }

    pub(crate) fn clear_needs_update_draw_properties(&mut self) {
        self.needs_update_draw_properties = false;
    }

    pub fn scrollbar_geometries_need_update(&self) -> bool {
        self.scrollbar_geometries_need_update
    }

    pub fn set_scrollbar_geometries_need_update(&mut self) {
        self.scrollbar_geometries_need_update = true;
    }

    pub fn clear_scrollbar_geometries_need_update(&mut self) {
        self.scrollbar_geometries_need_update = false;
    }

    pub fn device_scale_factor(&self) -> f32 {
        self.device_scale_factor
    }

    /// A device scale change damages every layer: per-node dirty bits cannot
    /// capture it, so the full-tree flag takes over.
    pub fn set_device_scale_factor(&mut self, device_scale_factor: f32) {
        if self.device_scale_factor == device_scale_factor {
            return;
        }
        self.device_scale_factor = device_scale_factor;
        self.property_trees.full_tree_damaged = true;
        self.set_needs_update_draw_properties();
    }

    pub fn current_page_scale_factor(&self) -> f32 {
        self.current_page_scale_factor
    }

    pub fn set_current_page_scale_factor(&mut self, page_scale_factor: f32) {
        if self.current_page_scale_factor == page_scale_factor {
            return;
        }
        self.current_page_scale_factor = page_scale_factor;
        self.property_trees.full_tree_damaged = true;
        self.set_needs_update_draw_properties();
    }

    pub fn scrollable_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.scrollable_layers.iter().copied()
    }

    pub(crate) fn add_scrollable_layer(&mut self, id: LayerId) {
        self.scrollable_layers.insert(id);
    }

    fn remove_scrollable_layer(&mut self, id: LayerId) {
        self.scrollable_layers.remove(&id);
    }

    pub(crate) fn add_to_element_layer_list(
        &mut self,
        element_id: Option<ElementId>,
        layer_id: LayerId,
    ) {
        let Some(element_id) = element_id else {
            return;
        };
        if let Some(previous) = self.element_to_layer.insert(element_id, layer_id) {
            if previous != layer_id {
                log::warn!("{element_id} was already bound to {previous}");
            }
        }
    }

    pub(crate) fn remove_from_element_layer_list(&mut self, element_id: Option<ElementId>) {
        if let Some(element_id) = element_id {
            self.element_to_layer.remove(&element_id);
        }
    }

    pub fn layer_id_for_element(&self, element_id: ElementId) -> Option<LayerId> {
        self.element_to_layer.get(&element_id).copied()
    }

    pub(crate) fn add_layer_should_push_properties(&mut self, id: LayerId) {
        self.layers_that_should_push_properties.insert(id);
    }

    fn remove_layer_should_push_properties(&mut self, id: LayerId) {
        self.layers_that_should_push_properties.remove(&id);
    }

    fn take_layers_that_should_push_properties(&mut self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.layers_that_should_push_properties.drain().collect();
        ids.sort();
        ids
    }

    /// Follow-up to a scroll-offset change: keeps the transform tree in sync
    /// with the scroll tree and raises the derived dirty flags. Marking the
    /// transform node changed is what makes the scrolled layer report
    /// "changed via property trees".
    pub(crate) fn did_update_scroll_offset(&mut self, scroll_index: ScrollNodeId, offset: ScrollOffset) {
        let transform_id = self
            .property_trees
            .scroll_tree
            .node(scroll_index)
            .map(|node| node.transform_id);
        if let Some(transform_id) = transform_id {
            if let Some(node) = self.property_trees.transform_tree.node_mut(transform_id) {
                node.scroll_offset = offset;
                node.transform_changed = true;
            }
        }
        self.set_needs_update_draw_properties();
        self.set_scrollbar_geometries_need_update();
    }
}

/// One version of the scene: the set of layers plus the four property trees.
pub struct LayerTree {
    layers: FxHashMap<LayerId, Layer>,
    pub state: LayerTreeState,
}

impl LayerTree {
    pub fn new(kind: TreeKind, settings: CompositorSettings) -> Self {
        LayerTree {
            layers: FxHashMap::default(),
            state: LayerTreeState::new(kind, settings),
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.state.kind()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Inserts a layer, registering it with the tree and, if it carries an
    /// element id, with the element index.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        assert!(
            !self.layers.contains_key(&id),
            "layer id already registered with this tree"
        );
        debug!("registering {} with the {:?} tree", id, self.state.kind());

        self.state.add_to_element_layer_list(layer.element_id(), id);
        if layer.scrollable() {
            self.state.add_scrollable_layer(id);
        }

        let LayerTree { layers, state } = self;
        layers.insert(id, layer);
        layers
            .get_mut(&id)
            .expect("layer was just inserted")
            .set_needs_push_properties(state);
        id
    }

    /// Removes a layer, unregistering it from the tree and the element index.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let layer = self.layers.remove(&id)?;
        debug!("unregistering {} from the {:?} tree", id, self.state.kind());
        self.state.remove_from_element_layer_list(layer.element_id());
        self.state.remove_scrollable_layer(id);
        self.state.remove_layer_should_push_properties(id);
        Some(layer)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    /// A layer together with the tree state its mutators need.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<(&mut Layer, &mut LayerTreeState)> {
        let LayerTree { layers, state } = self;
        match layers.get_mut(&id) {
            Some(layer) => Some((layer, state)),
            None => None,
        }
    }

    pub fn layer_by_element(&self, element_id: ElementId) -> Option<&Layer> {
        let id = self.state.layer_id_for_element(element_id)?;
        self.layers.get(&id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.layers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Copies the property trees wholesale onto the active tree. Trees are
    /// pushed as a unit, never per layer, and before the per-layer push so
    /// layers on the active side observe the new trees' dirty bits.
    pub fn push_property_trees_to(&self, target: &mut LayerTree) {
        debug_assert!(!self.is_active() && target.is_active());
        target.state.property_trees = self.state.property_trees.clone();
        target.state.device_scale_factor = self.state.device_scale_factor;
        target.state.current_page_scale_factor = self.state.current_page_scale_factor;
        target.state.set_needs_update_draw_properties();
    }

    /// Pushes every layer scheduled for push onto its active counterpart.
    pub fn push_properties_to(&mut self, target: &mut LayerTree) {
        debug_assert!(!self.is_active() && target.is_active());
        let ids = self.state.take_layers_that_should_push_properties();
        debug!("pushing properties for {} layers", ids.len());
        for id in ids {
            let source = self
                .layers
                .get_mut(&id)
                .expect("scheduled layer missing from pending tree");
            let target_layer = target
                .layers
                .get_mut(&id)
                .expect("pushed layer missing from active tree");
            source.push_properties_to(target_layer, &mut target.state);
        }
    }

    /// Clears every layer's change tracking and the property trees' dirty
    /// bits in one pass.
    pub fn reset_all_change_tracking(&mut self) {
        for layer in self.layers.values_mut() {
            layer.reset_change_tracking();
        }
        self.state.property_trees.reset_change_bits();
        self.state.layers_that_should_push_properties.clear();
    }
}

/// The double-buffered pair: one pending tree receiving updates, one active
/// tree being drawn, and the single audited transfer between them.
pub struct LayerTreeHost {
    pending: LayerTree,
    active: LayerTree,
}

impl LayerTreeHost {
    /// A layer whose screen transform keeps landing back on the same spot
    /// while differing from the drawn tree jitters; this many consecutive
    /// hits make it count.
    pub const FIXED_POINT_HITS_THRESHOLD: i32 = 3;

    pub fn new(settings: CompositorSettings) -> Self {
        LayerTreeHost {
            pending: LayerTree::new(TreeKind::Pending, settings.clone()),
            active: LayerTree::new(TreeKind::Active, settings),
        }
    }

    pub fn pending_tree(&self) -> &LayerTree {
        &self.pending
    }

    pub fn pending_tree_mut(&mut self) -> &mut LayerTree {
        &mut self.pending
    }

    pub fn active_tree(&self) -> &LayerTree {
        &self.active
    }

    pub fn active_tree_mut(&mut self) -> &mut LayerTree {
        &mut self.active
    }

    /// The commit: synchronizes the layer sets, pushes property trees and
    /// dirty layer state onto the active tree, then clears the pending
    /// trees' change bits. Tree-sourced change flags are observed by the
    /// push before anything is reset; reordering these drops redraws.
    pub fn commit(&mut self) {
        debug!(
            "commit: {} pending layers, {} active layers",
            self.pending.layer_count(),
            self.active.layer_count()
        );
        self.sync_layer_lists();
        self.pending.push_property_trees_to(&mut self.active);
        self.pending.push_properties_to(&mut self.active);
        self.pending.state.property_trees.reset_change_bits();
    }

    /// Gives every pending layer an active counterpart and drops active
    /// layers whose pending half is gone.
    fn sync_layer_lists(&mut self) {
        for id in self.pending.layer_ids() {
            if self.pending.layer(id).is_some() && self.active.layer(id).is_none() {
                let kind = *self.pending.layer(id).expect("checked above").kind();
                self.active.add_layer(Layer::new(id, kind));
            }
        }
        for id in self.active.layer_ids() {
            if self.pending.layer(id).is_none() {
                self.active.remove_layer(id);
            }
        }
    }

    /// Measures how much `id` jitters: the distance its screen transform
    /// keeps snapping back across, weighted by the layer's visible area.
    /// Expects draw properties to be up to date on both trees.
    pub fn calculate_layer_jitter(&mut self, id: LayerId) -> f32 {
        let LayerTreeHost { pending, active } = self;
        let Some((layer, _)) = pending.layer_mut(id) else {
            return 0.0;
        };

        let mut jitter = 0.0;
        layer.performance.translation_from_last_frame = 0.0;
        let current = layer.draw_properties.screen_space_transform;

        if !layer.draw_properties.visible_layer_rect.is_empty() &&
            approximately_equal(
                &current,
                &layer.performance.last_commit_screen_space_transform,
            )
        {
            let translation = translation_from_active_counterpart(&current, active.layer(id));
            if translation > 0.0 {
                layer.performance.num_fixed_point_hits += 1;
                layer.performance.translation_from_last_frame = translation;
                if layer.performance.num_fixed_point_hits > Self::FIXED_POINT_HITS_THRESHOLD {
                    // Translation from the fixed point, scaled by sqrt(area)
                    // so both factors share a dimension.
                    let area = layer.draw_properties.visible_layer_rect.size.area() as f32;
                    jitter += translation * area.sqrt();
                }
            } else {
                layer.performance.num_fixed_point_hits = 0;
            }
        }

        layer.performance.last_commit_screen_space_transform = current;
        jitter
    }
}

/// How far the drawn (active) copy of a layer sits from the pending one, in
/// screen space. Zero when there is no counterpart, the counterpart has not
/// moved off identity, or the two transforms agree.
fn translation_from_active_counterpart(
    pending_transform: &ScreenTransform,
    active_layer: Option<&Layer>,
) -> f32 {
    let Some(active_layer) = active_layer else {
        return 0.0;
    };
    let active_transform = active_layer.draw_properties.screen_space_transform;
    if active_transform == ScreenTransform::identity() {
        return 0.0;
    }
    if approximately_equal(&active_transform, pending_transform) {
        return 0.0;
    }
    (to_2d_translation(&active_transform) - to_2d_translation(pending_transform)).length()
}

#[cfg(test)]
mod tests {
    use base::id::{EffectNodeId, ScrollNodeId, TransformNodeId};

    use super::*;
    use crate::layer::LayerKind;
    use crate::property_tree::{EffectNode, ScrollNode, TransformNode};
    use crate::units::{LayerIntRect, LayerIntSize, LayerTransform, LayerVector2D};

    /// A tree with one scrollable layer: container 100x50, content 100x200.
    fn tree_with_scroller(kind: TreeKind) -> (LayerTree, LayerId) {
        let mut tree = LayerTree::new(kind, CompositorSettings::default());

        let transform_root = tree.state.property_trees.transform_tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            TransformNodeId::INVALID,
        );
        let scroller_transform = tree.state.property_trees.transform_tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            transform_root,
        );
        tree.state
            .property_trees
            .effect_tree
            .insert(EffectNode::root(transform_root), EffectNodeId::INVALID);

        let scroll_root = tree.state.property_trees.scroll_tree.insert(
            ScrollNode::new(None, transform_root),
            ScrollNodeId::INVALID,
        );
        let mut scroll_node = ScrollNode::new(Some(ElementId(42)), scroller_transform);
        scroll_node.container_bounds = LayerIntSize::new(100, 50);
        scroll_node.bounds = LayerIntSize::new(100, 200);
        scroll_node.scrollable = true;
        let scroll_index = tree
            .state
            .property_trees
            .scroll_tree
            .insert(scroll_node, scroll_root);

        let mut layer = Layer::new(LayerId(1), LayerKind::Content);
        layer.set_element_id_for_testing(Some(ElementId(42)));
        layer.set_transform_tree_index(scroller_transform);
        layer.set_effect_tree_index(EffectNodeId(0));
        layer.set_scroll_tree_index(scroll_index);
        let id = tree.add_layer(layer);

        let (layer, state) = tree.layer_mut(id).unwrap();
        layer.set_bounds(LayerIntSize::new(100, 50), state);
        layer.set_scrollable(LayerIntSize::new(100, 50), state);
        layer.reset_change_tracking();
        (tree, id)
    }

    #[test]
    fn redundant_set_bounds_does_not_dirty_the_layer() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Pending);
        let (layer, state) = tree.layer_mut(id).unwrap();

        layer.set_bounds(LayerIntSize::new(100, 50), state);
        assert!(!layer.change_flags().any());
        assert!(!layer.needs_push_properties());

        layer.set_bounds(LayerIntSize::new(120, 50), state);
        assert!(layer.change_flags().changed_direct());
        layer.reset_change_tracking();

        layer.set_bounds(LayerIntSize::new(120, 50), state);
        assert!(!layer.change_flags().any());
    }

    #[test]
    fn scroll_is_clamped_to_derived_maximum() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Active);
        let (layer, state) = tree.layer_mut(id).unwrap();

        assert_eq!(
            layer.max_scroll_offset(&state.property_trees),
            ScrollOffset::new(0.0, 150.0)
        );

        let unconsumed = layer.scroll_by(LayerVector2D::new(0.0, 500.0), state);
        assert_eq!(unconsumed, LayerVector2D::new(0.0, 350.0));
        assert_eq!(
            layer.current_scroll_offset(&state.property_trees),
            ScrollOffset::new(0.0, 150.0)
        );
    }

    #[test]
    fn scrolling_marks_layer_changed_via_property_trees() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Active);
        let (layer, state) = tree.layer_mut(id).unwrap();

        assert!(!layer.layer_property_changed(&state.property_trees));
        layer.scroll_by(LayerVector2D::new(0.0, 10.0), state);
        assert!(layer.layer_property_changed_from_trees(&state.property_trees));
        assert!(state.needs_update_draw_properties());
        assert!(state.scrollbar_geometries_need_update());
    }

    #[test]
    fn device_scale_change_damages_every_layer() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Pending);
        tree.state.set_device_scale_factor(2.0);
        let layer = tree.layer(id).unwrap();
        assert!(layer.layer_property_changed_from_trees(&tree.state.property_trees));
    }

    #[test]
    fn commit_pushes_dirty_state_once() {
        let mut host = LayerTreeHost::new(CompositorSettings::default());
        let (pending, id) = tree_with_scroller(TreeKind::Pending);
        *host.pending_tree_mut() = pending;

        {
            let (layer, state) = host.pending_tree_mut().layer_mut(id).unwrap();
            layer.set_bounds(LayerIntSize::new(64, 64), state);
            layer.union_update_rect(LayerIntRect::from_size(LayerIntSize::new(8, 8)));
        }
        host.commit();

        let active_layer = host.active_tree().layer(id).unwrap();
        assert_eq!(active_layer.bounds(), LayerIntSize::new(64, 64));
        assert_eq!(
            active_layer.update_rect(),
            LayerIntRect::from_size(LayerIntSize::new(8, 8))
        );
        assert!(active_layer.change_flags().changed_direct());

        let pending_layer = host.pending_tree().layer(id).unwrap();
        assert!(!pending_layer.change_flags().any());
        assert!(pending_layer.update_rect().is_empty());

        // A second commit with no intervening mutation leaves the active
        // layer untouched.
        host.active_tree_mut().reset_all_change_tracking();
        host.commit();
        let active_layer = host.active_tree().layer(id).unwrap();
        assert!(!active_layer.change_flags().any());
        assert_eq!(active_layer.bounds(), LayerIntSize::new(64, 64));
    }

    #[test]
    fn commit_synchronizes_layer_sets() {
        let mut host = LayerTreeHost::new(CompositorSettings::default());
        host.pending_tree_mut()
            .add_layer(Layer::new(LayerId(3), LayerKind::Content));
        host.commit();
        assert!(host.active_tree().layer(LayerId(3)).is_some());

        host.pending_tree_mut().remove_layer(LayerId(3));
        host.commit();
        assert!(host.active_tree().layer(LayerId(3)).is_none());
    }

    #[test]
    fn hidden_subtree_suppresses_hit_testing() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Pending);
        {
            let (layer, state) = tree.layer_mut(id).unwrap();
            layer.set_hit_testable(true, state);
        }
        assert!(
            tree.layer(id)
                .unwrap()
                .hit_testable(&tree.state.property_trees)
        );

        tree.state
            .property_trees
            .effect_tree
            .node_mut(EffectNodeId(0))
            .unwrap()
            .subtree_hidden = true;
        assert!(
            !tree
                .layer(id)
                .unwrap()
                .hit_testable(&tree.state.property_trees)
        );
    }

    #[test]
    fn element_index_follows_layer_lifecycle() {
        let (mut tree, id) = tree_with_scroller(TreeKind::Pending);
        assert_eq!(tree.state.layer_id_for_element(ElementId(42)), Some(id));
        assert!(tree.layer_by_element(ElementId(42)).is_some());

        tree.remove_layer(id);
        assert_eq!(tree.state.layer_id_for_element(ElementId(42)), None);
    }
}
