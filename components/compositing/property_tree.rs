/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The four property trees: transform, effect, clip, and scroll.
//!
//! A property tree is a dense, indexed forest. Layers reference nodes by
//! integer index instead of holding the state themselves, so thousands of
//! layers can share one transform or clip node with O(1) lookup. Indices are
//! only stable until the owning tree is rebuilt; a rebuild reassigns every
//! index, which is why scroll offsets are keyed by [`ElementId`] rather than
//! by node index.
//!
//! All mutation goes through tree-level setters. A layer never writes to a
//! node through its cached index.

use std::fmt;

use base::id::{ClipNodeId, EffectNodeId, ElementId, ScrollNodeId, TransformNodeId};
use euclid::Vector3D;
use rustc_hash::FxHashMap;

use crate::geometry::is_2d_integer_translation;
use crate::units::{
    DevicePixel, LayerIntSize, LayerPixel, LayerRect, LayerTransform, LayerVector2D,
    RoundedCornerBounds, ScreenTransform, ScrollOffset, clamp_offset,
};

/// An index type usable as a property-tree node id.
pub trait PropertyTreeNodeId: Copy + Eq + fmt::Debug {
    const INVALID: Self;

    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;

    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! impl_property_tree_node_id {
    ($($id:ident),+) => {
        $(impl PropertyTreeNodeId for $id {
            const INVALID: Self = $id::INVALID;

            fn from_index(index: usize) -> Self {
                $id(index)
            }

            fn index(self) -> usize {
                self.0
            }
        })+
    };
}

impl_property_tree_node_id!(TransformNodeId, EffectNodeId, ClipNodeId, ScrollNodeId);

/// A payload type storable in a [`PropertyTree`].
pub trait PropertyTreeNode {
    type Id: PropertyTreeNodeId;

    fn id(&self) -> Self::Id;
    fn set_id(&mut self, id: Self::Id);
    fn parent_id(&self) -> Self::Id;
    fn set_parent_id(&mut self, parent: Self::Id);
}

macro_rules! impl_property_tree_node {
    ($node:ident, $id:ident) => {
        impl PropertyTreeNode for $node {
            type Id = $id;

            fn id(&self) -> $id {
                self.id
            }

            fn set_id(&mut self, id: $id) {
                self.id = id;
            }

            fn parent_id(&self) -> $id {
                self.parent_id
            }

            fn set_parent_id(&mut self, parent: $id) {
                self.parent_id = parent;
            }
        }
    };
}

/// A dense indexed forest of property nodes.
///
/// Ids are assigned in insertion order, parents strictly before children, so
/// every ancestor walk is a strictly decreasing index sequence and terminates.
#[derive(Clone, Debug)]
pub struct PropertyTree<N: PropertyTreeNode> {
    nodes: Vec<N>,
}

impl<N: PropertyTreeNode> Default for PropertyTree<N> {
    fn default() -> Self {
        PropertyTree { nodes: Vec::new() }
    }
}

impl<N: PropertyTreeNode> PropertyTree<N> {
    pub fn new() -> Self {
        PropertyTree { nodes: Vec::new() }
    }

    /// Inserts `node` as a child of `parent` and returns its assigned id.
    /// Only the first node of a tree may be inserted without a parent.
    pub fn insert(&mut self, mut node: N, parent: N::Id) -> N::Id {
        if parent.is_valid() {
            assert!(
                parent.index() < self.nodes.len(),
                "property tree parent out of bounds"
            );
        } else {
            assert!(
                self.nodes.is_empty(),
                "only the root node may be inserted without a parent"
            );
        }
        let id = N::Id::from_index(self.nodes.len());
        node.set_id(id);
        node.set_parent_id(parent);
        self.nodes.push(node);
        id
    }

    /// The node for `id`, or `None` for the invalid sentinel. An id that is
    /// valid but outside the tree's current size is a contract violation and
    /// panics.
    pub fn node(&self, id: N::Id) -> Option<&N> {
        if !id.is_valid() {
            return None;
        }
        Some(&self.nodes[id.index()])
    }

    pub fn node_mut(&mut self, id: N::Id) -> Option<&mut N> {
        if !id.is_valid() {
            return None;
        }
        Some(&mut self.nodes[id.index()])
    }

    pub fn parent(&self, node: &N) -> Option<&N> {
        self.node(node.parent_id())
    }

    pub fn contains(&self, id: N::Id) -> bool {
        id.is_valid() && id.index() < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut N> {
        self.nodes.iter_mut()
    }

    /// Walks from `id` towards the root, starting with `id` itself.
    pub fn ancestors(&self, id: N::Id) -> Ancestors<'_, N> {
        Ancestors {
            tree: self,
            current: id,
        }
    }

    /// Drops every node. All outstanding ids become invalid; callers must run
    /// a full index reassignment pass before using the tree again.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

pub struct Ancestors<'a, N: PropertyTreeNode> {
    tree: &'a PropertyTree<N>,
    current: N::Id,
}

impl<'a, N: PropertyTreeNode> Iterator for Ancestors<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        let node = self.tree.node(self.current)?;
        self.current = node.parent_id();
        Some(node)
    }
}

/// A node of the transform tree.
#[derive(Clone, Debug)]
pub struct TransformNode {
    id: TransformNodeId,
    parent_id: TransformNodeId,
    /// Transform from this node's space to its parent's, before
    /// `post_translation`.
    pub local: LayerTransform,
    /// The node's origin in its parent's space.
    pub post_translation: LayerVector2D,
    /// Offset subtracted from the translation when this node scrolls. Kept in
    /// sync with the scroll tree by `LayerTreeState::did_update_scroll_offset`.
    pub scroll_offset: ScrollOffset,
    /// Groups 3D-transformed siblings for back-to-front sorting. Zero means
    /// the node does not participate in 3D sorting.
    pub sorting_context_id: i32,
    pub in_subtree_of_page_scale_node: bool,
    /// Set when this node's transform changed since the last commit; cleared
    /// by `PropertyTrees::reset_change_bits`.
    pub transform_changed: bool,
}

impl TransformNode {
    pub fn new(local: LayerTransform, post_translation: LayerVector2D) -> Self {
        TransformNode {
            id: TransformNodeId::INVALID,
            parent_id: TransformNodeId::INVALID,
            local,
            post_translation,
            scroll_offset: ScrollOffset::zero(),
            sorting_context_id: 0,
            in_subtree_of_page_scale_node: false,
            transform_changed: false,
        }
    }
}

impl_property_tree_node!(TransformNode, TransformNodeId);

pub type TransformTree = PropertyTree<TransformNode>;

impl PropertyTree<TransformNode> {
    /// The accumulated transform from `id`'s space to screen space.
    ///
    /// Derived on demand from tree state, never cached, so repeated calls are
    /// referentially transparent until the tree changes.
    pub fn to_screen(&self, id: TransformNodeId) -> ScreenTransform {
        let mut accumulated = LayerTransform::identity();
        for node in self.ancestors(id) {
            let offset = node.post_translation - node.scroll_offset;
            let node_to_parent = node
                .local
                .then_translate(Vector3D::new(offset.x, offset.y, 0.0));
            accumulated = accumulated.then(&node_to_parent);
        }
        accumulated.with_destination::<DevicePixel>()
    }

    /// Replaces a node's local transform, marking the node changed.
    pub fn set_local_transform(&mut self, id: TransformNodeId, local: LayerTransform) {
        let node = self.node_mut(id).expect("setting transform on missing node");
        if node.local == local {
            return;
        }
        node.local = local;
        node.transform_changed = true;
    }

    /// Whether every transform from `id` to the root is a 2D integer
    /// translation. Scroll offsets count against this: a fractional scroll
    /// offset breaks LCD-text eligibility just like a fractional transform.
    pub fn has_only_integer_translations(&self, id: TransformNodeId) -> bool {
        self.ancestors(id).all(|node| {
            let offset = node.post_translation - node.scroll_offset;
            is_2d_integer_translation(&node.local) &&
                offset.x.fract() == 0.0 &&
                offset.y.fract() == 0.0
        })
    }
}

/// Blend modes a layer or surface can composite with. The subset of
/// Porter-Duff and CSS mix-blend-modes the draw step understands.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BlendMode {
    #[default]
    SourceOver,
    DestinationIn,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Difference,
    Exclusion,
}

/// A node of the effect tree.
#[derive(Clone, Debug)]
pub struct EffectNode {
    id: EffectNodeId,
    parent_id: EffectNodeId,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// True when this effect renders into its own surface. The root effect
    /// node always does.
    pub has_render_surface: bool,
    /// The transform-tree node establishing this effect's coordinate space.
    pub transform_id: TransformNodeId,
    /// Hides the subtree from hit testing without changing drawn output.
    pub subtree_hidden: bool,
    pub rounded_corner_bounds: Option<RoundedCornerBounds<LayerPixel>>,
    pub is_fast_rounded_corner: bool,
    /// Set when this node's effect changed since the last commit; cleared by
    /// `PropertyTrees::reset_change_bits`.
    pub effect_changed: bool,
}

impl EffectNode {
    pub fn new(opacity: f32, transform_id: TransformNodeId) -> Self {
        EffectNode {
            id: EffectNodeId::INVALID,
            parent_id: EffectNodeId::INVALID,
            opacity,
            blend_mode: BlendMode::SourceOver,
            has_render_surface: false,
            transform_id,
            subtree_hidden: false,
            rounded_corner_bounds: None,
            is_fast_rounded_corner: false,
            effect_changed: false,
        }
    }

    /// The root effect node: the root render surface.
    pub fn root(transform_id: TransformNodeId) -> Self {
        let mut node = Self::new(1.0, transform_id);
        node.has_render_surface = true;
        node
    }
}

impl_property_tree_node!(EffectNode, EffectNodeId);

pub type EffectTree = PropertyTree<EffectNode>;

impl PropertyTree<EffectNode> {
    /// The product of opacities from `id` to the root.
    pub fn screen_space_opacity(&self, id: EffectNodeId) -> f32 {
        self.ancestors(id).map(|node| node.opacity).product()
    }

    /// The nearest node at or above `id` that owns a render surface: the
    /// surface `id`'s content draws into.
    pub fn render_surface_ancestor(&self, id: EffectNodeId) -> EffectNodeId {
        for node in self.ancestors(id) {
            if node.has_render_surface {
                return node.id;
            }
        }
        EffectNodeId::INVALID
    }

    /// The opacity a layer with effect node `id` draws with into its render
    /// target. Opacity of the target surface itself is applied when the
    /// surface is composited, so the walk stops short of the target node.
    pub fn draw_opacity(&self, id: EffectNodeId) -> f32 {
        let target = self.render_surface_ancestor(id);
        let mut opacity = 1.0;
        for node in self.ancestors(id) {
            if node.id == target {
                break;
            }
            opacity *= node.opacity;
        }
        opacity
    }

    /// Replaces a node's opacity, marking the node changed.
    pub fn set_opacity(&mut self, id: EffectNodeId, opacity: f32) {
        let node = self.node_mut(id).expect("setting opacity on missing node");
        if node.opacity == opacity {
            return;
        }
        node.opacity = opacity;
        node.effect_changed = true;
    }
}

/// A node of the clip tree. The rect is expressed in the space of
/// `transform_id`.
#[derive(Clone, Debug)]
pub struct ClipNode {
    id: ClipNodeId,
    parent_id: ClipNodeId,
    pub clip: LayerRect,
    pub transform_id: TransformNodeId,
}

impl ClipNode {
    pub fn new(clip: LayerRect, transform_id: TransformNodeId) -> Self {
        ClipNode {
            id: ClipNodeId::INVALID,
            parent_id: ClipNodeId::INVALID,
            clip,
            transform_id,
        }
    }
}

impl_property_tree_node!(ClipNode, ClipNodeId);

pub type ClipTree = PropertyTree<ClipNode>;

/// A node of the scroll tree.
///
/// The maximum scroll offset is derived from `bounds` and `container_bounds`
/// on every query instead of being stored, so it can never go stale. The
/// current offset is not stored here at all; see [`ScrollTree`].
#[derive(Clone, Debug)]
pub struct ScrollNode {
    id: ScrollNodeId,
    parent_id: ScrollNodeId,
    pub element_id: Option<ElementId>,
    /// Size of the scroll container (the viewport onto the content).
    pub container_bounds: LayerIntSize,
    /// Size of the scrollable content.
    pub bounds: LayerIntSize,
    pub scrollable: bool,
    pub user_scrollable_horizontal: bool,
    pub user_scrollable_vertical: bool,
    /// The transform node this scroller moves.
    pub transform_id: TransformNodeId,
}

impl ScrollNode {
    pub fn new(element_id: Option<ElementId>, transform_id: TransformNodeId) -> Self {
        ScrollNode {
            id: ScrollNodeId::INVALID,
            parent_id: ScrollNodeId::INVALID,
            element_id,
            container_bounds: LayerIntSize::zero(),
            bounds: LayerIntSize::zero(),
            scrollable: false,
            user_scrollable_horizontal: true,
            user_scrollable_vertical: true,
            transform_id,
        }
    }
}

impl_property_tree_node!(ScrollNode, ScrollNodeId);

/// Result of applying a scroll delta through the scroll tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollUpdate {
    /// The part of the delta the node's range could not absorb.
    pub unconsumed: LayerVector2D,
    /// Whether the stored offset actually moved.
    pub offset_changed: bool,
}

/// The scroll tree: scroll nodes plus the authoritative current offsets.
///
/// Offsets are keyed by [`ElementId`] so they survive node-index rebuilds.
#[derive(Clone, Debug, Default)]
pub struct ScrollTree {
    tree: PropertyTree<ScrollNode>,
    offsets: FxHashMap<ElementId, ScrollOffset>,
}

impl ScrollTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: ScrollNode, parent: ScrollNodeId) -> ScrollNodeId {
        self.tree.insert(node, parent)
    }

    pub fn node(&self, id: ScrollNodeId) -> Option<&ScrollNode> {
        self.tree.node(id)
    }

    pub fn node_mut(&mut self, id: ScrollNodeId) -> Option<&mut ScrollNode> {
        self.tree.node_mut(id)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The maximum scroll offset of `id`: content size minus container size,
    /// clamped to zero per axis. Never negative, even when content is smaller
    /// than its container.
    pub fn max_scroll_offset(&self, id: ScrollNodeId) -> ScrollOffset {
        let Some(node) = self.node(id) else {
            return ScrollOffset::zero();
        };
        ScrollOffset::new(
            (node.bounds.width - node.container_bounds.width).max(0) as f32,
            (node.bounds.height - node.container_bounds.height).max(0) as f32,
        )
    }

    pub fn current_scroll_offset(&self, element_id: ElementId) -> ScrollOffset {
        self.offsets
            .get(&element_id)
            .copied()
            .unwrap_or_else(ScrollOffset::zero)
    }

    /// Stores a new offset for `element_id`. Returns whether the stored value
    /// changed; redundant writes are dropped without side effects.
    pub fn set_scroll_offset(&mut self, element_id: ElementId, offset: ScrollOffset) -> bool {
        if self.current_scroll_offset(element_id) == offset {
            return false;
        }
        self.offsets.insert(element_id, offset);
        true
    }

    /// Componentwise clamp of `offset` into `[0, max_scroll_offset(id)]`.
    pub fn clamp_scroll_offset(&self, id: ScrollNodeId, offset: ScrollOffset) -> ScrollOffset {
        clamp_offset(offset, ScrollOffset::zero(), self.max_scroll_offset(id))
    }

    /// Applies `delta` to `id`'s offset, clamped to the node's range. Axes the
    /// node is not user-scrollable on absorb nothing.
    pub fn scroll_by(&mut self, id: ScrollNodeId, delta: LayerVector2D) -> ScrollUpdate {
        let Some(node) = self.node(id) else {
            return ScrollUpdate {
                unconsumed: delta,
                offset_changed: false,
            };
        };
        let Some(element_id) = node.element_id else {
            return ScrollUpdate {
                unconsumed: delta,
                offset_changed: false,
            };
        };

        let mut adjusted = delta;
        if !node.user_scrollable_horizontal {
            adjusted.x = 0.0;
        }
        if !node.user_scrollable_vertical {
            adjusted.y = 0.0;
        }

        let old_offset = self.current_scroll_offset(element_id);
        let new_offset = self.clamp_scroll_offset(id, old_offset + adjusted);
        let offset_changed = self.set_scroll_offset(element_id, new_offset);
        ScrollUpdate {
            unconsumed: old_offset + delta - new_offset,
            offset_changed,
        }
    }

    /// Drops every node while keeping the element-keyed offsets, so scrollers
    /// resume at their old positions after the index reassignment pass.
    pub fn rebuild(&mut self) {
        self.tree.clear();
    }
}

/// The bundle of all four property trees for one `LayerTree`.
#[derive(Clone, Debug, Default)]
pub struct PropertyTrees {
    pub transform_tree: TransformTree,
    pub effect_tree: EffectTree,
    pub clip_tree: ClipTree,
    pub scroll_tree: ScrollTree,
    /// When set, every layer reports itself changed by the property trees
    /// regardless of per-node dirty bits. Set by global resets such as a
    /// device scale factor change.
    pub full_tree_damaged: bool,
}

impl PropertyTrees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds all four trees from scratch. Every outstanding node index
    /// becomes invalid and every layer is considered damaged.
    pub fn clear(&mut self) {
        self.transform_tree.clear();
        self.effect_tree.clear();
        self.clip_tree.clear();
        self.scroll_tree.rebuild();
        self.full_tree_damaged = true;
    }

    /// Clears the per-node change bits and the full-tree damage flag. Runs
    /// exactly once per commit, after layers have observed the bits.
    pub fn reset_change_bits(&mut self) {
        for node in self.transform_tree.iter_mut() {
            node.transform_changed = false;
        }
        for node in self.effect_tree.iter_mut() {
            node.effect_changed = false;
        }
        self.full_tree_damaged = false;
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{TestResult, quickcheck};

    use super::*;

    fn scroll_tree_with_node(
        container: (i32, i32),
        content: (i32, i32),
    ) -> (ScrollTree, ScrollNodeId) {
        let mut tree = ScrollTree::new();
        let root = tree.insert(
            ScrollNode::new(None, TransformNodeId(0)),
            ScrollNodeId::INVALID,
        );
        let mut node = ScrollNode::new(Some(ElementId(7)), TransformNodeId(1));
        node.container_bounds = LayerIntSize::new(container.0, container.1);
        node.bounds = LayerIntSize::new(content.0, content.1);
        node.scrollable = true;
        let id = tree.insert(node, root);
        (tree, id)
    }

    #[test]
    fn lookup_of_invalid_sentinel_is_none() {
        let tree = TransformTree::new();
        assert!(tree.node(TransformNodeId::INVALID).is_none());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn lookup_past_tree_size_is_a_contract_violation() {
        let mut tree = TransformTree::new();
        tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            TransformNodeId::INVALID,
        );
        let _ = tree.node(TransformNodeId(5));
    }

    #[test]
    fn ancestor_walk_terminates_at_root() {
        let mut tree = TransformTree::new();
        let root = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            TransformNodeId::INVALID,
        );
        let child = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            root,
        );
        let grandchild = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            child,
        );
        let chain: Vec<TransformNodeId> = tree.ancestors(grandchild).map(|n| n.id()).collect();
        assert_eq!(chain, vec![grandchild, child, root]);
    }

    #[test]
    fn to_screen_composes_child_into_parent() {
        let mut tree = TransformTree::new();
        let root = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            TransformNodeId::INVALID,
        );
        let child = tree.insert(
            TransformNode::new(
                LayerTransform::scale(2.0, 2.0, 1.0),
                LayerVector2D::new(10.0, 20.0),
            ),
            root,
        );
        let screen = tree.to_screen(child);
        let mapped = screen
            .transform_point2d(euclid::Point2D::new(1.0, 1.0))
            .unwrap();
        assert_eq!(mapped, euclid::Point2D::new(12.0, 22.0));
    }

    #[test]
    fn scrolling_shifts_to_screen_transform() {
        let mut tree = TransformTree::new();
        let root = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            TransformNodeId::INVALID,
        );
        let scroller = tree.insert(
            TransformNode::new(LayerTransform::identity(), LayerVector2D::zero()),
            root,
        );
        tree.node_mut(scroller).unwrap().scroll_offset = ScrollOffset::new(0.0, 30.0);
        let mapped = tree
            .to_screen(scroller)
            .transform_point2d(euclid::Point2D::new(0.0, 0.0))
            .unwrap();
        assert_eq!(mapped, euclid::Point2D::new(0.0, -30.0));
    }

    #[test]
    fn max_scroll_offset_clamps_to_zero_for_undersized_content() {
        let (tree, id) = scroll_tree_with_node((100, 50), (80, 40));
        assert_eq!(tree.max_scroll_offset(id), ScrollOffset::zero());
    }

    #[test]
    fn scroll_by_clamps_and_reports_unconsumed_delta() {
        let (mut tree, id) = scroll_tree_with_node((100, 50), (100, 200));
        assert_eq!(tree.max_scroll_offset(id), ScrollOffset::new(0.0, 150.0));

        let update = tree.scroll_by(id, LayerVector2D::new(0.0, 500.0));
        assert!(update.offset_changed);
        assert_eq!(update.unconsumed, LayerVector2D::new(0.0, 350.0));
        assert_eq!(
            tree.current_scroll_offset(ElementId(7)),
            ScrollOffset::new(0.0, 150.0)
        );
    }

    #[test]
    fn set_scroll_offset_short_circuits_redundant_writes() {
        let (mut tree, _) = scroll_tree_with_node((100, 50), (100, 200));
        assert!(tree.set_scroll_offset(ElementId(7), ScrollOffset::new(0.0, 10.0)));
        assert!(!tree.set_scroll_offset(ElementId(7), ScrollOffset::new(0.0, 10.0)));
    }

    #[test]
    fn offsets_survive_rebuild() {
        let (mut tree, _) = scroll_tree_with_node((100, 50), (100, 200));
        tree.set_scroll_offset(ElementId(7), ScrollOffset::new(0.0, 120.0));
        tree.rebuild();
        assert!(tree.is_empty());
        assert_eq!(
            tree.current_scroll_offset(ElementId(7)),
            ScrollOffset::new(0.0, 120.0)
        );
    }

    quickcheck! {
        fn clamped_offsets_stay_within_limits(x: f32, y: f32) -> TestResult {
            if !x.is_finite() || !y.is_finite() {
                return TestResult::discard();
            }
            let (tree, id) = scroll_tree_with_node((100, 50), (300, 200));
            let max = tree.max_scroll_offset(id);
            let clamped = tree.clamp_scroll_offset(id, ScrollOffset::new(x, y));
            let within = clamped.x >= 0.0 && clamped.x <= max.x &&
                clamped.y >= 0.0 && clamped.y <= max.y;
            let in_range_is_identity = (x < 0.0 || x > max.x || y < 0.0 || y > max.y) ||
                clamped == ScrollOffset::new(x, y);
            TestResult::from_bool(within && in_range_is_identity)
        }
    }
}
