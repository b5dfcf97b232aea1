/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The root-frame viewport: one logical scrollable area composed of the
//! visual (pinch-zoom) viewport and the layout (document) viewport.
//!
//! The user-visible scroll position is always the sum of the two viewports'
//! offsets. A single scroll gesture is split between them by
//! [`RootFrameViewport::distribute_scroll_between_viewports`], respecting
//! each viewport's independent clamp range: delta the primary viewport cannot
//! absorb flows to the secondary one, and delta neither can absorb is
//! reported back rather than silently lost.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use euclid::{Point2D, Size2D};
use log::trace;

use crate::layer::ScrollbarOrientation;
use crate::units::{LayerPoint, LayerRect, LayerSize, LayerVector2D, ScrollOffset, clamp_offset};

/// Completion callback for a scroll. Runs when the offset change has fully
/// taken effect (immediately for instant scrolls, at animation end for smooth
/// ones).
pub type ScrollCallback = Box<dyn FnOnce()>;

/// What initiated a scroll. User scrolls are clamped against the
/// user-scrollable range; the other kinds only against the layout range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollType {
    User,
    Programmatic,
    Clamping,
    /// Scroll-anchoring adjustments; distributed layout-first so the anchor
    /// stays put in the document.
    Anchoring,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollBehavior {
    /// Resolve to the layout viewport's styled behavior.
    Auto,
    Instant,
    Smooth,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollGranularity {
    Line,
    Page,
    Pixel,
    PrecisePixel,
    Document,
}

/// Per-axis alignment for [`RootFrameViewport::scroll_into_view`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScrollAlignment {
    /// Scroll the minimal amount that brings the rect into view; nothing if
    /// it is already visible.
    Nearest,
    Start,
    Center,
    End,
}

/// The outcome of a user scroll: which axes moved, and how much delta nothing
/// could absorb.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollResult {
    pub did_scroll_x: bool,
    pub did_scroll_y: bool,
    pub unused_scroll_delta: LayerVector2D,
}

impl ScrollResult {
    pub fn did_scroll(&self) -> bool {
        self.did_scroll_x || self.did_scroll_y
    }
}

/// One-shot snapshot restoring a previous session's scroll state: applied at
/// most once, then cleared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollRestoreState {
    pub page_scale_factor: Option<f32>,
    /// The combined offset at snapshot time.
    pub scroll_offset: ScrollOffset,
    /// The visual viewport's share. Snapshots from older sessions did not
    /// record it; `None` distributes whatever the layout viewport is not
    /// already holding.
    pub visual_viewport_offset: Option<ScrollOffset>,
}

/// External sequencer for smooth scrolls; consumed only through this queueing
/// interface.
pub trait ScrollSequencer {
    fn queue_animation(&mut self, offset: ScrollOffset, behavior: ScrollBehavior);
    fn abort_animations(&mut self);
}

/// A scrollable region with an independent clamp range.
///
/// Implementations clamp in `set_scroll_offset` and run `on_finish` when the
/// offset change has fully taken effect.
pub trait ScrollableArea {
    fn scroll_offset(&self) -> ScrollOffset;

    /// The animator-reported offset. The stored offset may have had its
    /// fractional part truncated; distribution must see the precise value.
    fn animator_current_offset(&self) -> ScrollOffset {
        self.scroll_offset()
    }

    fn minimum_scroll_offset(&self) -> ScrollOffset {
        ScrollOffset::zero()
    }

    fn maximum_scroll_offset(&self) -> ScrollOffset;

    fn visible_size(&self) -> LayerSize;

    fn set_scroll_offset(
        &mut self,
        offset: ScrollOffset,
        scroll_type: ScrollType,
        behavior: ScrollBehavior,
        on_finish: Option<ScrollCallback>,
    );

    fn user_input_scrollable(&self, orientation: ScrollbarOrientation) -> bool;

    fn scroll_behavior_style(&self) -> ScrollBehavior {
        ScrollBehavior::Instant
    }

    fn clamp_scroll_offset(&self, offset: ScrollOffset) -> ScrollOffset {
        clamp_offset(
            offset,
            self.minimum_scroll_offset(),
            self.maximum_scroll_offset(),
        )
    }

    /// How much of `delta` this area could absorb from its current animator
    /// offset.
    fn compute_delta_to_consume(&self, delta: LayerVector2D) -> LayerVector2D {
        let current = self.animator_current_offset();
        self.clamp_scroll_offset(current + delta) - current
    }

    /// Applies a user scroll of an already-pixel-converted delta.
    fn user_scroll(
        &mut self,
        _granularity: ScrollGranularity,
        delta: LayerVector2D,
        on_finish: Option<ScrollCallback>,
    ) -> ScrollResult {
        let consumed = self.compute_delta_to_consume(delta);
        let target = self.animator_current_offset() + consumed;
        self.set_scroll_offset(target, ScrollType::User, ScrollBehavior::Instant, on_finish);
        ScrollResult {
            did_scroll_x: consumed.x != 0.0,
            did_scroll_y: consumed.y != 0.0,
            unused_scroll_delta: delta - consumed,
        }
    }

    /// Pixels one unit of `granularity` stands for on `orientation`.
    fn scroll_step(&self, granularity: ScrollGranularity, orientation: ScrollbarOrientation) -> f32 {
        let visible = match orientation {
            ScrollbarOrientation::Horizontal => self.visible_size().width,
            ScrollbarOrientation::Vertical => self.visible_size().height,
        };
        match granularity {
            ScrollGranularity::Line => PIXELS_PER_LINE_STEP,
            ScrollGranularity::Page => (visible * PAGE_STEP_FRACTION).max(1.0),
            ScrollGranularity::Pixel | ScrollGranularity::PrecisePixel => 1.0,
            ScrollGranularity::Document => match orientation {
                ScrollbarOrientation::Horizontal => self.maximum_scroll_offset().x,
                ScrollbarOrientation::Vertical => self.maximum_scroll_offset().y,
            },
        }
    }

    /// Snap-point correction for a prospective end position, if this area
    /// defines snap targets.
    fn snap_position_for(&self, _target: LayerPoint) -> Option<LayerPoint> {
        None
    }

    fn cancel_programmatic_scroll_animation(&mut self) {}

    /// Restore hook for the visual viewport: apply a page scale and/or a
    /// location in one step. Other areas ignore it.
    fn set_scale_and_location(&mut self, _scale: Option<f32>, _location: Option<LayerPoint>) {}
}

const PIXELS_PER_LINE_STEP: f32 = 40.0;
const PAGE_STEP_FRACTION: f32 = 0.875;

/// Runs a callback after `count` completions; the counterpart of
/// `base::BarrierClosure`.
#[derive(Clone)]
pub struct BarrierClosure {
    inner: Rc<BarrierInner>,
}

struct BarrierInner {
    remaining: Cell<usize>,
    callback: RefCell<Option<ScrollCallback>>,
}

impl BarrierClosure {
    pub fn new(count: usize, callback: ScrollCallback) -> Self {
        assert!(count > 0);
        BarrierClosure {
            inner: Rc::new(BarrierInner {
                remaining: Cell::new(count),
                callback: RefCell::new(Some(callback)),
            }),
        }
    }

    pub fn run(&self) {
        let remaining = self.inner.remaining.get();
        if remaining == 0 {
            return;
        }
        self.inner.remaining.set(remaining - 1);
        if remaining == 1 {
            if let Some(callback) = self.inner.callback.borrow_mut().take() {
                callback();
            }
        }
    }

    fn as_callback(&self) -> ScrollCallback {
        let barrier = self.clone();
        Box::new(move || barrier.run())
    }
}

fn barrier_callback(barrier: &Option<BarrierClosure>) -> Option<ScrollCallback> {
    barrier.as_ref().map(BarrierClosure::as_callback)
}

/// Which sub-viewport a distribution applies delta to first. This ordering is
/// policy: animated scrolls move the visual viewport first so zoomed-in
/// scrolling feels responsive; anchoring adjustments move the layout viewport
/// first so the anchored content does not shift.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewportToScrollFirst {
    Visual,
    Layout,
}

/// The area a viewport permits user scrolls over: its full range on
/// user-scrollable axes, and a zero-size pin at the current offset otherwise.
fn user_scrollable_rect(area: &dyn ScrollableArea) -> LayerRect {
    let scrollable_size = area.maximum_scroll_offset() - area.minimum_scroll_offset();
    let (x, width) = if area.user_input_scrollable(ScrollbarOrientation::Horizontal) {
        (area.minimum_scroll_offset().x, scrollable_size.x)
    } else {
        (area.scroll_offset().x, 0.0)
    };
    let (y, height) = if area.user_input_scrollable(ScrollbarOrientation::Vertical) {
        (area.minimum_scroll_offset().y, scrollable_size.y)
    } else {
        (area.scroll_offset().y, 0.0)
    };
    LayerRect::new(Point2D::new(x, y), Size2D::new(width, height))
}

/// Composes the visual and layout viewports into one logical scrollable
/// area. Owns neither; both outlive it.
pub struct RootFrameViewport {
    visual_viewport: Rc<RefCell<dyn ScrollableArea>>,
    layout_viewport: Rc<RefCell<dyn ScrollableArea>>,
    sequencer: Option<Rc<RefCell<dyn ScrollSequencer>>>,
    pending_restore_state: Option<ScrollRestoreState>,
    should_restore_scroll: bool,
}

impl RootFrameViewport {
    pub fn new(
        visual_viewport: Rc<RefCell<dyn ScrollableArea>>,
        layout_viewport: Rc<RefCell<dyn ScrollableArea>>,
    ) -> Self {
        RootFrameViewport {
            visual_viewport,
            layout_viewport,
            sequencer: None,
            pending_restore_state: None,
            should_restore_scroll: false,
        }
    }

    pub fn set_sequencer(&mut self, sequencer: Rc<RefCell<dyn ScrollSequencer>>) {
        self.sequencer = Some(sequencer);
    }

    /// The combined, user-visible scroll offset.
    pub fn scroll_offset(&self) -> ScrollOffset {
        self.layout_viewport.borrow().scroll_offset() +
            self.visual_viewport.borrow().scroll_offset()
    }

    /// The combined offset as the animators report it, keeping fractional
    /// precision the stored offsets may have truncated.
    pub fn scroll_offset_from_animators(&self) -> ScrollOffset {
        self.visual_viewport.borrow().animator_current_offset() +
            self.layout_viewport.borrow().animator_current_offset()
    }

    pub fn minimum_scroll_offset(&self) -> ScrollOffset {
        self.layout_viewport.borrow().minimum_scroll_offset() +
            self.visual_viewport.borrow().minimum_scroll_offset()
    }

    pub fn maximum_scroll_offset(&self) -> ScrollOffset {
        self.layout_viewport.borrow().maximum_scroll_offset() +
            self.visual_viewport.borrow().maximum_scroll_offset()
    }

    pub fn clamp_scroll_offset(&self, offset: ScrollOffset) -> ScrollOffset {
        clamp_offset(
            offset,
            self.minimum_scroll_offset(),
            self.maximum_scroll_offset(),
        )
    }

    pub fn user_input_scrollable(&self, orientation: ScrollbarOrientation) -> bool {
        self.visual_viewport.borrow().user_input_scrollable(orientation) ||
            self.layout_viewport.borrow().user_input_scrollable(orientation)
    }

    /// Clamp for user-initiated scrolls: the effective range is the sum of
    /// each viewport's user-scrollable rect, so an axis user-scrollable in
    /// only one of the two stays user-scrollable overall.
    pub fn clamp_to_user_scrollable_offset(&self, offset: ScrollOffset) -> ScrollOffset {
        let layout_rect = user_scrollable_rect(&*self.layout_viewport.borrow());
        let visual_rect = user_scrollable_rect(&*self.visual_viewport.borrow());
        let user_scrollable = LayerRect::new(
            layout_rect.origin + visual_rect.origin.to_vector(),
            layout_rect.size + visual_rect.size,
        );
        ScrollOffset::new(
            offset
                .x
                .clamp(user_scrollable.origin.x, user_scrollable.max_x()),
            offset
                .y
                .clamp(user_scrollable.origin.y, user_scrollable.max_y()),
        )
    }

    /// The effective viewport: the intersection of the two viewports'
    /// visible rects, in content coordinates.
    pub fn visible_scroll_snapport_rect(&self) -> LayerRect {
        let layout = self.layout_viewport.borrow();
        let visual = self.visual_viewport.borrow();
        let frame_rect_in_content = LayerRect::new(
            layout.scroll_offset().to_point(),
            layout.visible_size(),
        );
        let visual_rect_in_content = LayerRect::new(
            (layout.scroll_offset() + visual.animator_current_offset()).to_point(),
            visual.visible_size(),
        );
        visual_rect_in_content
            .intersection(&frame_rect_in_content)
            .unwrap_or_else(LayerRect::zero)
    }

    /// Sets the combined offset, choosing the distribution order by type and
    /// behavior, and clamping up front for the instant path.
    pub fn set_scroll_offset(
        &mut self,
        offset: ScrollOffset,
        scroll_type: ScrollType,
        mut behavior: ScrollBehavior,
        on_finish: Option<ScrollCallback>,
    ) {
        if behavior == ScrollBehavior::Auto {
            behavior = self.layout_viewport.borrow().scroll_behavior_style();
        }

        if scroll_type == ScrollType::Anchoring {
            self.distribute_scroll_between_viewports(
                offset,
                scroll_type,
                behavior,
                ViewportToScrollFirst::Layout,
                on_finish,
            );
            return;
        }

        if behavior == ScrollBehavior::Smooth {
            self.distribute_scroll_between_viewports(
                offset,
                scroll_type,
                behavior,
                ViewportToScrollFirst::Visual,
                on_finish,
            );
            return;
        }

        let clamped_offset = self.clamp_scroll_offset(offset);
        self.distribute_scroll_between_viewports(
            clamped_offset,
            scroll_type,
            behavior,
            ViewportToScrollFirst::Visual,
            on_finish,
        );
    }

    /// Splits one logical scroll between the two viewports.
    ///
    /// The primary viewport takes as much of the delta as its range allows;
    /// the remainder goes to the secondary one, clamped to its own range.
    /// The completion callback fires after both offset-setters have
    /// completed, or after one when the other never needed to move. A
    /// zero-delta request completes immediately with no side effects, so
    /// in-flight animations are not restarted.
    pub fn distribute_scroll_between_viewports(
        &self,
        offset: ScrollOffset,
        scroll_type: ScrollType,
        behavior: ScrollBehavior,
        scroll_first: ViewportToScrollFirst,
        on_finish: Option<ScrollCallback>,
    ) {
        // Offsets as reported by each viewport's animator: the scrollable
        // area's stored offset may have the fractional part truncated.
        let old_offset = self.scroll_offset_from_animators();
        let delta = offset - old_offset;

        if delta == LayerVector2D::zero() {
            if let Some(on_finish) = on_finish {
                on_finish();
            }
            return;
        }

        trace!(
            "distributing scroll delta {:?} ({:?} first)",
            delta, scroll_first
        );

        let (primary, secondary) = match scroll_first {
            ViewportToScrollFirst::Visual => (&self.visual_viewport, &self.layout_viewport),
            ViewportToScrollFirst::Layout => (&self.layout_viewport, &self.visual_viewport),
        };

        let target_offset = {
            let primary = primary.borrow();
            primary.clamp_scroll_offset(primary.animator_current_offset() + delta)
        };

        let barrier = on_finish.map(|on_finish| BarrierClosure::new(2, on_finish));

        primary.borrow_mut().set_scroll_offset(
            target_offset,
            scroll_type,
            behavior,
            barrier_callback(&barrier),
        );

        // Scroll the secondary viewport if the primary one did not absorb
        // the whole delta.
        let updated_offset = secondary.borrow().animator_current_offset() + target_offset;
        let applied = updated_offset - old_offset;
        let remaining = delta - applied;

        if remaining == LayerVector2D::zero() {
            if let Some(barrier) = barrier {
                barrier.run();
            }
            return;
        }

        let secondary_target = {
            let secondary = secondary.borrow();
            secondary.clamp_scroll_offset(secondary.animator_current_offset() + remaining)
        };
        secondary.borrow_mut().set_scroll_offset(
            secondary_target,
            scroll_type,
            behavior,
            barrier_callback(&barrier),
        );
    }

    /// Applies a user scroll of `delta` units of `granularity`, splitting the
    /// pixel delta between the viewports and reporting what neither consumed.
    pub fn user_scroll(
        &mut self,
        granularity: ScrollGranularity,
        delta: LayerVector2D,
        on_finish: Option<ScrollCallback>,
    ) -> ScrollResult {
        let (step_x, step_y) = {
            let layout = self.layout_viewport.borrow();
            (
                layout.scroll_step(granularity, ScrollbarOrientation::Horizontal),
                layout.scroll_step(granularity, ScrollbarOrientation::Vertical),
            )
        };
        let pixel_delta = LayerVector2D::new(delta.x * step_x, delta.y * step_y);

        // Precompute what the visual viewport can absorb: an animated
        // viewport reports having consumed everything it is handed, but the
        // layout viewport must only receive the true remainder.
        let visual_consumed_delta = self
            .visual_viewport
            .borrow()
            .compute_delta_to_consume(pixel_delta);

        // The layout viewport only receives delta on its user-scrollable
        // axes; the rest is handed back in the result.
        let layout_delta = pixel_delta - visual_consumed_delta;
        let layout = self.layout_viewport.borrow();
        let scrollable_axis_delta = LayerVector2D::new(
            if layout.user_input_scrollable(ScrollbarOrientation::Horizontal) {
                layout_delta.x
            } else {
                0.0
            },
            if layout.user_input_scrollable(ScrollbarOrientation::Vertical) {
                layout_delta.y
            } else {
                0.0
            },
        );
        drop(layout);

        // Nothing will scroll: bail before cancelling animations.
        if visual_consumed_delta == LayerVector2D::zero() &&
            scrollable_axis_delta == LayerVector2D::zero()
        {
            if let Some(on_finish) = on_finish {
                on_finish();
            }
            return ScrollResult {
                did_scroll_x: false,
                did_scroll_y: false,
                unused_scroll_delta: pixel_delta,
            };
        }

        self.cancel_programmatic_scroll_animation();
        if let Some(sequencer) = &self.sequencer {
            sequencer.borrow_mut().abort_animations();
        }

        if visual_consumed_delta == pixel_delta {
            return self.visual_viewport.borrow_mut().user_scroll(
                granularity,
                visual_consumed_delta,
                on_finish,
            );
        }

        let barrier = on_finish.map(|on_finish| BarrierClosure::new(2, on_finish));
        let visual_result = self.visual_viewport.borrow_mut().user_scroll(
            granularity,
            visual_consumed_delta,
            barrier_callback(&barrier),
        );
        let layout_result = self.layout_viewport.borrow_mut().user_scroll(
            granularity,
            scrollable_axis_delta,
            barrier_callback(&barrier),
        );

        // Delta held back from non-user-scrollable layout axes counts as
        // unused.
        let unscrollable_axis_delta = layout_delta - scrollable_axis_delta;
        ScrollResult {
            did_scroll_x: visual_result.did_scroll_x || layout_result.did_scroll_x,
            did_scroll_y: visual_result.did_scroll_y || layout_result.did_scroll_y,
            unused_scroll_delta: layout_result.unused_scroll_delta + unscrollable_axis_delta,
        }
    }

    /// Scrolls the minimal amount that satisfies the alignment of
    /// `rect_in_absolute` against the effective viewport, with snap-point
    /// correction from the layout viewport. Returns the rect in absolute
    /// coordinates after the move.
    pub fn scroll_into_view(
        &mut self,
        rect_in_absolute: LayerRect,
        params: &ScrollIntoViewParams,
    ) -> LayerRect {
        let snapport = self.visible_scroll_snapport_rect();

        let layout_offset = self.layout_viewport.borrow().scroll_offset();
        let rect_in_document = rect_in_absolute
            .translate(LayerVector2D::new(layout_offset.x.floor(), layout_offset.y.floor()));

        let mut new_offset = self.clamp_scroll_offset(scroll_offset_to_expose(
            snapport,
            rect_in_document,
            params.align_x,
            params.align_y,
            self.scroll_offset(),
        ));
        if params.scroll_type == ScrollType::User {
            new_offset = self.clamp_to_user_scrollable_offset(new_offset);
        }

        if let Some(snapped) = self
            .layout_viewport
            .borrow()
            .snap_position_for(new_offset.to_point())
        {
            new_offset = snapped.to_vector();
        }

        if new_offset != self.scroll_offset() {
            if params.is_for_scroll_sequence {
                debug_assert!(matches!(
                    params.scroll_type,
                    ScrollType::Programmatic | ScrollType::User
                ));
                let behavior = if params.behavior == ScrollBehavior::Auto {
                    self.layout_viewport.borrow().scroll_behavior_style()
                } else {
                    params.behavior
                };
                if let Some(sequencer) = &self.sequencer {
                    sequencer.borrow_mut().queue_animation(new_offset, behavior);
                }
            } else {
                self.set_scroll_offset(new_offset, params.scroll_type, params.behavior, None);
            }
        }

        let layout_offset = self.layout_viewport.borrow().scroll_offset();
        rect_in_document.translate(-LayerVector2D::new(
            layout_offset.x.round(),
            layout_offset.y.round(),
        ))
    }

    /// Restores the combined offset to `target_offset`, e.g. for scroll
    /// anchoring. The layout viewport only takes integer offsets; the visual
    /// viewport compensates for the sub-pixel remainder, so the layout step
    /// rounds away from zero.
    pub fn restore_to_anchor(&mut self, target_offset: ScrollOffset) {
        // Clamp both viewports first so deltas are computed against valid
        // offsets.
        let visual_offset = self.visual_viewport.borrow().scroll_offset();
        self.visual_viewport.borrow_mut().set_scroll_offset(
            visual_offset,
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );
        let layout_offset = self.layout_viewport.borrow().scroll_offset();
        self.layout_viewport.borrow_mut().set_scroll_offset(
            layout_offset,
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );

        let delta = target_offset - self.scroll_offset();
        let visual_target = self.visual_viewport.borrow().scroll_offset() + delta;
        self.visual_viewport.borrow_mut().set_scroll_offset(
            visual_target,
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );

        let delta = target_offset - self.scroll_offset();
        let layout_delta = LayerVector2D::new(
            if delta.x < 0.0 { delta.x.floor() } else { delta.x.ceil() },
            if delta.y < 0.0 { delta.y.floor() } else { delta.y.ceil() },
        );
        let layout_target = self.layout_viewport.borrow().scroll_offset() + layout_delta;
        self.layout_viewport.borrow_mut().set_scroll_offset(
            layout_target,
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );

        let delta = target_offset - self.scroll_offset();
        let visual_target = self.visual_viewport.borrow().scroll_offset() + delta;
        self.visual_viewport.borrow_mut().set_scroll_offset(
            visual_target,
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );
    }

    pub fn set_pending_restore_state(&mut self, state: ScrollRestoreState) {
        self.pending_restore_state = Some(state);
    }

    pub fn pending_restore_state(&self) -> Option<&ScrollRestoreState> {
        self.pending_restore_state.as_ref()
    }

    pub fn set_should_restore_scroll(&mut self, should_restore_scroll: bool) {
        self.should_restore_scroll = should_restore_scroll;
    }

    /// Applies the pending restore snapshot, if any, exactly once.
    pub fn apply_pending_restore_state(&mut self) {
        let Some(state) = self.pending_restore_state.take() else {
            return;
        };
        trace!("applying pending scroll restore state {:?}", state);

        // Snapshots that predate visual-viewport recording distribute
        // whatever the layout viewport is not already holding.
        let visual_offset = state.visual_viewport_offset.unwrap_or_else(|| {
            state.scroll_offset - self.layout_viewport.borrow().scroll_offset()
        });

        let scale = state.page_scale_factor;
        let location = self
            .should_restore_scroll
            .then(|| visual_offset.to_point());
        if scale.is_some() || location.is_some() {
            self.visual_viewport
                .borrow_mut()
                .set_scale_and_location(scale, location);
        }

        self.should_restore_scroll = false;
    }

    pub fn cancel_programmatic_scroll_animation(&mut self) {
        self.visual_viewport
            .borrow_mut()
            .cancel_programmatic_scroll_animation();
        self.layout_viewport
            .borrow_mut()
            .cancel_programmatic_scroll_animation();
    }
}

/// Parameters for [`RootFrameViewport::scroll_into_view`].
#[derive(Clone, Copy, Debug)]
pub struct ScrollIntoViewParams {
    pub align_x: ScrollAlignment,
    pub align_y: ScrollAlignment,
    pub scroll_type: ScrollType,
    pub behavior: ScrollBehavior,
    /// Route the resulting offset through the smooth-scroll sequencer
    /// instead of applying it directly.
    pub is_for_scroll_sequence: bool,
}

impl Default for ScrollIntoViewParams {
    fn default() -> Self {
        ScrollIntoViewParams {
            align_x: ScrollAlignment::Nearest,
            align_y: ScrollAlignment::Nearest,
            scroll_type: ScrollType::Programmatic,
            behavior: ScrollBehavior::Instant,
            is_for_scroll_sequence: false,
        }
    }
}

fn aligned_delta(align: ScrollAlignment, visible_min: f32, visible_max: f32, expose_min: f32, expose_max: f32) -> f32 {
    match align {
        ScrollAlignment::Start => expose_min - visible_min,
        ScrollAlignment::End => expose_max - visible_max,
        ScrollAlignment::Center => {
            (expose_min + expose_max) / 2.0 - (visible_min + visible_max) / 2.0
        },
        ScrollAlignment::Nearest => {
            if expose_min >= visible_min && expose_max <= visible_max {
                // Already fully visible.
                0.0
            } else if expose_max - expose_min > visible_max - visible_min {
                // Larger than the viewport: align the leading edge.
                expose_min - visible_min
            } else if expose_min < visible_min {
                expose_min - visible_min
            } else {
                expose_max - visible_max
            }
        },
    }
}

/// The offset that exposes `expose_rect` within a viewport currently showing
/// `visible_rect`, both in content coordinates.
fn scroll_offset_to_expose(
    visible_rect: LayerRect,
    expose_rect: LayerRect,
    align_x: ScrollAlignment,
    align_y: ScrollAlignment,
    current_offset: ScrollOffset,
) -> ScrollOffset {
    let delta = LayerVector2D::new(
        aligned_delta(
            align_x,
            visible_rect.min_x(),
            visible_rect.max_x(),
            expose_rect.min_x(),
            expose_rect.max_x(),
        ),
        aligned_delta(
            align_y,
            visible_rect.min_y(),
            visible_rect.max_y(),
            expose_rect.min_y(),
            expose_rect.max_y(),
        ),
    );
    current_offset + delta
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeScrollableArea {
        offset: ScrollOffset,
        max: ScrollOffset,
        visible: LayerSize,
        horizontal_user_scrollable: bool,
        vertical_user_scrollable: bool,
        set_offset_calls: usize,
        restored_scale: Option<f32>,
        restored_location: Option<LayerPoint>,
    }

    impl FakeScrollableArea {
        fn new(max: ScrollOffset, visible: LayerSize) -> Rc<RefCell<FakeScrollableArea>> {
            Rc::new(RefCell::new(FakeScrollableArea {
                offset: ScrollOffset::zero(),
                max,
                visible,
                horizontal_user_scrollable: true,
                vertical_user_scrollable: true,
                set_offset_calls: 0,
                restored_scale: None,
                restored_location: None,
            }))
        }
    }

    impl ScrollableArea for FakeScrollableArea {
        fn scroll_offset(&self) -> ScrollOffset {
            self.offset
        }

        fn maximum_scroll_offset(&self) -> ScrollOffset {
            self.max
        }

        fn visible_size(&self) -> LayerSize {
            self.visible
        }

        fn set_scroll_offset(
            &mut self,
            offset: ScrollOffset,
            _scroll_type: ScrollType,
            _behavior: ScrollBehavior,
            on_finish: Option<ScrollCallback>,
        ) {
            self.offset = self.clamp_scroll_offset(offset);
            self.set_offset_calls += 1;
            if let Some(on_finish) = on_finish {
                on_finish();
            }
        }

        fn user_input_scrollable(&self, orientation: ScrollbarOrientation) -> bool {
            match orientation {
                ScrollbarOrientation::Horizontal => self.horizontal_user_scrollable,
                ScrollbarOrientation::Vertical => self.vertical_user_scrollable,
            }
        }

        fn set_scale_and_location(&mut self, scale: Option<f32>, location: Option<LayerPoint>) {
            self.restored_scale = scale;
            self.restored_location = location;
        }
    }

    fn viewport_with_ranges(
        visual_max: ScrollOffset,
        layout_max: ScrollOffset,
    ) -> (
        RootFrameViewport,
        Rc<RefCell<FakeScrollableArea>>,
        Rc<RefCell<FakeScrollableArea>>,
    ) {
        let visual = FakeScrollableArea::new(visual_max, LayerSize::new(100.0, 100.0));
        let layout = FakeScrollableArea::new(layout_max, LayerSize::new(100.0, 100.0));
        let viewport = RootFrameViewport::new(visual.clone(), layout.clone());
        (viewport, visual, layout)
    }

    #[test]
    fn visual_first_distribution_fills_visual_then_layout() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        viewport.set_scroll_offset(
            ScrollOffset::new(0.0, 500.0),
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );

        assert_eq!(visual.borrow().offset, ScrollOffset::new(0.0, 20.0));
        assert_eq!(layout.borrow().offset, ScrollOffset::new(0.0, 480.0));
        assert_eq!(viewport.scroll_offset(), ScrollOffset::new(0.0, 500.0));
    }

    #[test]
    fn anchoring_distribution_moves_layout_viewport_first() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        viewport.set_scroll_offset(
            ScrollOffset::new(0.0, 300.0),
            ScrollType::Anchoring,
            ScrollBehavior::Instant,
            None,
        );

        assert_eq!(visual.borrow().offset, ScrollOffset::zero());
        assert_eq!(layout.borrow().offset, ScrollOffset::new(0.0, 300.0));
    }

    #[test]
    fn distribution_clamps_to_the_union_of_ranges() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(10.0, 20.0),
            ScrollOffset::new(100.0, 200.0),
        );

        viewport.set_scroll_offset(
            ScrollOffset::new(5000.0, 5000.0),
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            None,
        );

        let sum = visual.borrow().offset + layout.borrow().offset;
        assert_eq!(sum, viewport.maximum_scroll_offset());
        assert_eq!(sum, ScrollOffset::new(110.0, 220.0));
    }

    #[test]
    fn zero_delta_completes_immediately_without_side_effects() {
        let (viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        let completions = Rc::new(Cell::new(0));
        let recorded = completions.clone();
        viewport.distribute_scroll_between_viewports(
            ScrollOffset::zero(),
            ScrollType::Programmatic,
            ScrollBehavior::Smooth,
            ViewportToScrollFirst::Visual,
            Some(Box::new(move || recorded.set(recorded.get() + 1))),
        );

        assert_eq!(completions.get(), 1);
        assert_eq!(visual.borrow().set_offset_calls, 0);
        assert_eq!(layout.borrow().set_offset_calls, 0);
    }

    #[test]
    fn completion_fires_once_after_both_viewports_move() {
        let (viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        let completions = Rc::new(Cell::new(0));
        let recorded = completions.clone();
        viewport.distribute_scroll_between_viewports(
            ScrollOffset::new(0.0, 100.0),
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            ViewportToScrollFirst::Visual,
            Some(Box::new(move || recorded.set(recorded.get() + 1))),
        );

        assert_eq!(completions.get(), 1);
        assert_eq!(visual.borrow().set_offset_calls, 1);
        assert_eq!(layout.borrow().set_offset_calls, 1);
    }

    #[test]
    fn completion_fires_when_only_the_primary_viewport_moves() {
        let (viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        let completions = Rc::new(Cell::new(0));
        let recorded = completions.clone();
        viewport.distribute_scroll_between_viewports(
            ScrollOffset::new(0.0, 15.0),
            ScrollType::Programmatic,
            ScrollBehavior::Instant,
            ViewportToScrollFirst::Visual,
            Some(Box::new(move || recorded.set(recorded.get() + 1))),
        );

        assert_eq!(completions.get(), 1);
        assert_eq!(visual.borrow().offset, ScrollOffset::new(0.0, 15.0));
        assert_eq!(layout.borrow().set_offset_calls, 0);
    }

    #[test]
    fn axis_scrollable_in_one_viewport_stays_user_scrollable() {
        let (viewport, visual, _layout) = viewport_with_ranges(
            ScrollOffset::new(50.0, 20.0),
            ScrollOffset::new(100.0, 1000.0),
        );
        visual.borrow_mut().horizontal_user_scrollable = false;

        assert!(viewport.user_input_scrollable(ScrollbarOrientation::Horizontal));

        // Horizontally only the layout range is user reachable.
        let clamped = viewport.clamp_to_user_scrollable_offset(ScrollOffset::new(140.0, 0.0));
        assert_eq!(clamped, ScrollOffset::new(100.0, 0.0));
    }

    #[test]
    fn user_scroll_splits_delta_and_reports_unused() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );
        layout.borrow_mut().vertical_user_scrollable = false;

        let result = viewport.user_scroll(
            ScrollGranularity::Pixel,
            LayerVector2D::new(0.0, 100.0),
            None,
        );

        assert!(result.did_scroll_y);
        assert_eq!(visual.borrow().offset, ScrollOffset::new(0.0, 20.0));
        assert_eq!(layout.borrow().offset, ScrollOffset::zero());
        assert_eq!(result.unused_scroll_delta, LayerVector2D::new(0.0, 80.0));
    }

    #[test]
    fn user_scroll_converts_line_granularity_to_pixels() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        let result =
            viewport.user_scroll(ScrollGranularity::Line, LayerVector2D::new(0.0, 1.0), None);

        assert!(result.did_scroll_y);
        let applied = visual.borrow().offset + layout.borrow().offset;
        assert_eq!(applied, ScrollOffset::new(0.0, 40.0));
        assert_eq!(result.unused_scroll_delta, LayerVector2D::zero());
    }

    #[test]
    fn user_scroll_with_no_scrollable_axis_is_a_no_op() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::zero(),
            ScrollOffset::new(0.0, 1000.0),
        );
        layout.borrow_mut().vertical_user_scrollable = false;

        let completions = Rc::new(Cell::new(0));
        let recorded = completions.clone();
        let result = viewport.user_scroll(
            ScrollGranularity::Pixel,
            LayerVector2D::new(0.0, 50.0),
            Some(Box::new(move || recorded.set(recorded.get() + 1))),
        );

        assert!(!result.did_scroll());
        assert_eq!(result.unused_scroll_delta, LayerVector2D::new(0.0, 50.0));
        assert_eq!(completions.get(), 1);
        assert_eq!(visual.borrow().set_offset_calls, 0);
        assert_eq!(layout.borrow().set_offset_calls, 0);
    }

    #[test]
    fn restore_to_anchor_keeps_layout_offset_integral() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );

        viewport.restore_to_anchor(ScrollOffset::new(0.0, 100.5));

        let layout_offset = layout.borrow().offset;
        assert_eq!(layout_offset.y.fract(), 0.0);
        assert_eq!(
            visual.borrow().offset + layout_offset,
            ScrollOffset::new(0.0, 100.5)
        );
    }

    #[test]
    fn pending_restore_state_applies_once() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::new(0.0, 20.0),
            ScrollOffset::new(0.0, 1000.0),
        );
        layout.borrow_mut().offset = ScrollOffset::new(0.0, 30.0);

        viewport.set_should_restore_scroll(true);
        viewport.set_pending_restore_state(ScrollRestoreState {
            page_scale_factor: Some(2.0),
            scroll_offset: ScrollOffset::new(0.0, 50.0),
            visual_viewport_offset: None,
        });

        viewport.apply_pending_restore_state();
        assert_eq!(visual.borrow().restored_scale, Some(2.0));
        assert_eq!(
            visual.borrow().restored_location,
            Some(LayerPoint::new(0.0, 20.0))
        );
        assert!(viewport.pending_restore_state().is_none());

        // A second apply is a no-op.
        visual.borrow_mut().restored_scale = None;
        visual.borrow_mut().restored_location = None;
        viewport.apply_pending_restore_state();
        assert_eq!(visual.borrow().restored_scale, None);
        assert_eq!(visual.borrow().restored_location, None);
    }

    #[test]
    fn scroll_into_view_exposes_rect_below_the_viewport() {
        let (mut viewport, _visual, layout) = viewport_with_ranges(
            ScrollOffset::zero(),
            ScrollOffset::new(0.0, 1000.0),
        );

        viewport.scroll_into_view(
            LayerRect::new(Point2D::new(0.0, 150.0), Size2D::new(10.0, 10.0)),
            &ScrollIntoViewParams::default(),
        );

        assert_eq!(layout.borrow().offset, ScrollOffset::new(0.0, 60.0));
    }

    #[test]
    fn scroll_into_view_does_not_move_for_visible_rect() {
        let (mut viewport, visual, layout) = viewport_with_ranges(
            ScrollOffset::zero(),
            ScrollOffset::new(0.0, 1000.0),
        );

        viewport.scroll_into_view(
            LayerRect::new(Point2D::new(0.0, 10.0), Size2D::new(10.0, 10.0)),
            &ScrollIntoViewParams::default(),
        );

        assert_eq!(visual.borrow().offset, ScrollOffset::zero());
        assert_eq!(layout.borrow().offset, ScrollOffset::zero());
    }
}
