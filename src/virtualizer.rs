use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::bridge::{Bridge, Lifecycle};
use crate::cache::MeasurementCache;
use crate::measurements::{Layout, LayoutInput, sanitize_lanes, sanitize_size};
use crate::options::{OffsetCallback, RectCallback, Unsubscribe};
use crate::range;
use crate::scroll::{ScrollController, ScrollGeometry, approx_eq};
use crate::{
    Align, Error, IndexEmitter, ItemKey, Measurement, ObserverKind, OffsetChange, Range, Rect,
    ScrollBehavior, ScrollDirection, ScrollToFnOptions, ScrollToHandle, ScrollToOptions,
    ScrollToStatus, VirtualItem, VirtualRange, VirtualizerOptions, default_range_extractor,
};

struct ItemsMemo<K> {
    layout_version: u64,
    indexes: Vec<usize>,
    items: Rc<[VirtualItem<K>]>,
}

/// What `on_change` listeners can observe. A notification only fires when this changes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct NotifyState {
    range: Option<VirtualRange>,
    is_scrolling: bool,
    layout_version: u64,
    options_revision: u64,
    total_size: f64,
}

struct Core<S, E, K> {
    options: VirtualizerOptions<S, E, K>,
    options_revision: u64,
    lanes: usize,

    scroll_rect: Option<Rect>,
    scroll_offset: f64,
    scroll_adjustments: f64,
    is_scrolling: bool,
    scroll_direction: Option<ScrollDirection>,

    cache: MeasurementCache,
    layout: Layout,
    layout_version: u64,
    items_memo: Option<ItemsMemo<K>>,

    last_notified: Option<NotifyState>,
    notify_depth: usize,
    notify_pending: bool,

    bridge: Bridge<S, E, K>,
    scroll: ScrollController,
}

impl<S, E, K> Core<S, E, K> {
    fn rebuild_layout(&mut self) {
        let input = LayoutInput {
            count: self.options.count,
            lanes: self.lanes,
            gap: self.options.gap,
            padding_start: self.options.padding_start,
            scroll_margin: self.options.scroll_margin,
            estimate_size: &*self.options.estimate_size,
            cache: &self.cache,
        };
        self.layout = Layout::build(&input);
        self.layout_version = self.layout_version.wrapping_add(1);
    }

    fn reset_scroll_state(&mut self) {
        self.scroll_offset = self.options.initial_offset.resolve();
        self.scroll_rect = self.options.initial_rect;
        self.scroll_adjustments = 0.0;
        self.is_scrolling = false;
        self.scroll_direction = None;
    }

    /// Swaps in `options` and rebuilds whatever depends on what changed. Returns the
    /// registrations of item elements that fell out of range.
    fn apply_options(&mut self, options: VirtualizerOptions<S, E, K>) -> Vec<Unsubscribe> {
        let prev = core::mem::replace(&mut self.options, options);
        self.options_revision = self.options_revision.wrapping_add(1);
        let lanes = sanitize_lanes(self.options.lanes);

        let count = self.options.count;
        let count_changed = prev.count != count;
        let measurements_stale = prev.horizontal != self.options.horizontal
            || !Rc::ptr_eq(&prev.estimate_size, &self.options.estimate_size);
        let keys_changed = !Rc::ptr_eq(&prev.get_item_key, &self.options.get_item_key);
        let geometry_changed = lanes != self.lanes
            || prev.gap != self.options.gap
            || prev.padding_start != self.options.padding_start
            || prev.scroll_margin != self.options.scroll_margin;
        let was_enabled = prev.enabled;
        let enabled = self.options.enabled;
        vtrace!(
            count,
            lanes,
            enabled,
            overscan = self.options.overscan,
            "Virtualizer::set_options"
        );

        let mut released = Vec::new();
        if measurements_stale {
            vdebug!(
                dropped = self.cache.len(),
                "estimator or axis changed; measurement cache cleared"
            );
            self.cache.clear();
        }
        if count_changed {
            self.cache.prune_to_count(count);
            released = self.bridge.untrack_from(count);
        }
        self.lanes = lanes;

        if count_changed || measurements_stale || geometry_changed {
            self.rebuild_layout();
        } else if keys_changed {
            // Same geometry, new keys: only the projected items go stale.
            self.layout_version = self.layout_version.wrapping_add(1);
        }

        if was_enabled && !enabled {
            self.reset_scroll_state();
            self.scroll.end_pending(ScrollToStatus::Cancelled);
        } else if !was_enabled && enabled {
            self.reset_scroll_state();
        }
        released
    }

    fn viewport_size(&self) -> f64 {
        if !self.options.enabled || !self.bridge.has_viewport() {
            return 0.0;
        }
        self.scroll_rect
            .map_or(0.0, |rect| rect.main(self.options.horizontal))
    }

    fn total_size(&self) -> f64 {
        if !self.options.enabled {
            return 0.0;
        }
        let options = &self.options;
        let content_end = self
            .layout
            .content_end()
            .unwrap_or(options.padding_start + options.scroll_margin);
        (content_end - options.scroll_margin + options.padding_end).max(0.0)
    }

    fn max_scroll_offset(&self) -> f64 {
        (self.total_size() + self.options.scroll_margin - self.viewport_size()).max(0.0)
    }

    fn visible_range(&self) -> Option<VirtualRange> {
        if !self.options.enabled {
            return None;
        }
        let offset = self.scroll_offset.min(self.max_scroll_offset()).max(0.0);
        range::visible_range(
            self.layout.items(),
            self.lanes,
            offset,
            self.viewport_size(),
        )
    }

    fn extraction_range(&self) -> Option<Range> {
        let visible = self.visible_range()?;
        Some(Range {
            start_index: visible.start_index,
            end_index: visible.end_index,
            overscan: self.options.overscan.saturating_mul(self.lanes),
            count: self.options.count,
        })
    }

    fn indexes(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(range) = self.extraction_range() else {
            return out;
        };
        {
            let mut push = |index: usize| out.push(index);
            match &self.options.range_extractor {
                Some(extract) => {
                    let mut emitter = IndexEmitter::new(range, &mut push);
                    extract(range, &mut |index: usize| emitter.emit(index));
                }
                None => default_range_extractor(range, &mut push),
            }
        }
        out
    }

    fn geometry(&self) -> ScrollGeometry {
        ScrollGeometry {
            offset: self.scroll_offset,
            viewport: self.viewport_size(),
            max_offset: self.max_scroll_offset(),
            scroll_padding_start: self.options.scroll_padding_start,
            scroll_padding_end: self.options.scroll_padding_end,
        }
    }

    /// Out-of-range indexes are clamped to the last item.
    fn offset_for_index(&self, index: usize, align: Align) -> Option<(f64, Align)> {
        let last = self.layout.len().checked_sub(1)?;
        let item = self.layout.get(index.min(last))?;
        Some(self.geometry().offset_for_item(&item, align))
    }

    fn can_scroll(&self) -> bool {
        self.options.enabled && self.bridge.is_live()
    }

    fn is_dynamic(&self) -> bool {
        self.options.measure_element.is_some() && self.bridge.element_count() > 0
    }

    fn notify_state(&self) -> NotifyState {
        NotifyState {
            range: self.visible_range(),
            is_scrolling: self.is_scrolling,
            layout_version: self.layout_version,
            options_revision: self.options_revision,
            total_size: self.total_size(),
        }
    }
}

fn release_all(released: Vec<Unsubscribe>) {
    for unsubscribe in released {
        unsubscribe();
    }
}

/// A headless virtualization engine.
///
/// The handle is cheap to clone; clones share one engine. It holds no UI objects: the host injects
/// its capabilities through [`VirtualizerOptions`] (scroll element lookup, scroll function,
/// observers, optional measurement and frame scheduling), and the engine hands back which items to
/// render and where.
///
/// Callbacks handed to the host only hold a weak reference, so dropping every handle stops them.
/// Side-effecting host callbacks (scroll function, observers, measurement, frame scheduling,
/// `on_change`, unsubscribe closures) are never invoked while the engine state is borrowed and may
/// call back into the virtualizer. The pure ones listed on [`VirtualizerOptions`] are not.
pub struct Virtualizer<S, E, K = ItemKey> {
    inner: Rc<RefCell<Core<S, E, K>>>,
}

impl<S, E, K> Clone for Virtualizer<S, E, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, E, K> Virtualizer<S, E, K>
where
    S: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
    K: 'static,
{
    /// Creates a detached virtualizer. Nothing is observed until [`Virtualizer::did_mount`].
    ///
    /// Until then `initial_rect` and `initial_offset` stand in for the viewport, which is enough
    /// to compute a first window.
    pub fn new(options: VirtualizerOptions<S, E, K>) -> Self {
        let lanes = sanitize_lanes(options.lanes);
        vdebug!(
            count = options.count,
            lanes,
            enabled = options.enabled,
            overscan = options.overscan,
            "Virtualizer::new"
        );
        let mut core = Core {
            scroll_rect: options.initial_rect,
            scroll_offset: options.initial_offset.resolve(),
            options,
            options_revision: 0,
            lanes,
            scroll_adjustments: 0.0,
            is_scrolling: false,
            scroll_direction: None,
            cache: MeasurementCache::default(),
            layout: Layout::empty(lanes),
            layout_version: 0,
            items_memo: None,
            last_notified: None,
            notify_depth: 0,
            notify_pending: false,
            bridge: Bridge::new(),
            scroll: ScrollController::default(),
        };
        core.rebuild_layout();
        Self {
            inner: Rc::new(RefCell::new(core)),
        }
    }

    fn upgrade(owner: &Weak<RefCell<Core<S, E, K>>>) -> Option<Self> {
        owner.upgrade().map(|inner| Self { inner })
    }

    pub fn options(&self) -> VirtualizerOptions<S, E, K> {
        self.inner.borrow().options.clone()
    }

    /// Replaces the configuration snapshot.
    ///
    /// Cached measurements are dropped when `estimate_size` or the axis changes, pruned when the
    /// count shrinks and kept otherwise. When mounted, observers are re-wired if the scroll element
    /// or observer functions changed.
    pub fn set_options(&self, options: VirtualizerOptions<S, E, K>) -> Result<(), Error> {
        let (released, mounted) = {
            let mut core = self.inner.borrow_mut();
            let released = core.apply_options(options);
            (released, core.bridge.lifecycle() == Lifecycle::Mounted)
        };
        release_all(released);
        let result = if mounted { self.will_update() } else { Ok(()) };
        self.notify();
        result
    }

    /// Clones the current options, applies `f`, then delegates to `set_options`.
    pub fn update_options(
        &self,
        f: impl FnOnce(&mut VirtualizerOptions<S, E, K>),
    ) -> Result<(), Error> {
        let mut next = self.options();
        f(&mut next);
        self.set_options(next)
    }

    // Setters for tunables that never affect the observers.
    fn reconfigure(&self, f: impl FnOnce(&mut VirtualizerOptions<S, E, K>)) {
        let released = {
            let mut core = self.inner.borrow_mut();
            let mut next = core.options.clone();
            f(&mut next);
            core.apply_options(next)
        };
        release_all(released);
        self.notify();
    }

    pub fn set_count(&self, count: usize) {
        self.reconfigure(|o| o.count = count);
    }

    pub fn set_lanes(&self, lanes: usize) {
        self.reconfigure(|o| o.lanes = lanes);
    }

    pub fn set_overscan(&self, overscan: usize) {
        self.reconfigure(|o| o.overscan = overscan);
    }

    pub fn set_gap(&self, gap: f64) {
        self.reconfigure(|o| o.gap = gap);
    }

    pub fn set_padding(&self, padding_start: f64, padding_end: f64) {
        self.reconfigure(|o| {
            o.padding_start = padding_start;
            o.padding_end = padding_end;
        });
    }

    pub fn set_scroll_padding(&self, scroll_padding_start: f64, scroll_padding_end: f64) {
        self.reconfigure(|o| {
            o.scroll_padding_start = scroll_padding_start;
            o.scroll_padding_end = scroll_padding_end;
        });
    }

    pub fn set_scroll_margin(&self, scroll_margin: f64) {
        self.reconfigure(|o| o.scroll_margin = scroll_margin);
    }

    pub fn set_on_change(&self, on_change: Option<impl Fn(&Self, bool) + 'static>) {
        self.reconfigure(|o| o.on_change = on_change.map(|f| Rc::new(f) as _));
    }

    /// Disabling tears down the observers and cancels a pending scroll-to; enabling again re-wires
    /// them when mounted.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), Error> {
        if self.enabled() == enabled {
            return Ok(());
        }
        self.update_options(|o| o.enabled = enabled)
    }

    /// Batches multiple updates into a single `on_change` notification.
    pub fn batch_update(&self, f: impl FnOnce(&Self)) {
        {
            let mut core = self.inner.borrow_mut();
            core.notify_depth = core.notify_depth.saturating_add(1);
        }

        f(self);

        let flush = {
            let mut core = self.inner.borrow_mut();
            debug_assert!(core.notify_depth > 0, "notify_depth underflow");
            core.notify_depth = core.notify_depth.saturating_sub(1);
            core.notify_depth == 0 && core::mem::take(&mut core.notify_pending)
        };
        if flush {
            self.notify();
        }
    }

    fn notify(&self) {
        let (on_change, is_scrolling) = {
            let mut core = self.inner.borrow_mut();
            if core.notify_depth > 0 {
                core.notify_pending = true;
                return;
            }
            let state = core.notify_state();
            if core.last_notified == Some(state) {
                return;
            }
            core.last_notified = Some(state);
            (core.options.on_change.clone(), state.is_scrolling)
        };
        if let Some(on_change) = on_change {
            on_change(self, is_scrolling);
        }
    }

    /// Wires the observation bridge to the host's scroll element.
    ///
    /// The scroll function is called once with the current offset before any observer is
    /// registered, so that the host starts where the engine thinks it is.
    pub fn did_mount(&self) -> Result<(), Error> {
        vdebug!("Virtualizer::did_mount");
        self.inner
            .borrow_mut()
            .bridge
            .set_lifecycle(Lifecycle::Mounted);
        let result = self.will_update();
        self.notify();
        result
    }

    /// Re-reads the scroll element and re-wires the observers if it, or one of the observer
    /// functions, changed since the last call. A no-op unless mounted.
    ///
    /// When registering an observer fails, everything registered so far is released and the
    /// error is returned.
    pub fn will_update(&self) -> Result<(), Error> {
        let (get_scroll_element, enabled, observe_rect, observe_offset) = {
            let core = self.inner.borrow();
            if core.bridge.lifecycle() != Lifecycle::Mounted {
                return Ok(());
            }
            (
                Rc::clone(&core.options.get_scroll_element),
                core.options.enabled,
                Rc::clone(&core.options.observe_element_rect),
                Rc::clone(&core.options.observe_element_offset),
            )
        };
        let element = if enabled { get_scroll_element() } else { None };
        let needs_rewire =
            self.inner
                .borrow()
                .bridge
                .needs_rewire(element.as_ref(), &observe_rect, &observe_offset);
        if !needs_rewire {
            return Ok(());
        }

        self.cleanup();
        let Some(element) = element else {
            return Ok(());
        };

        let (scroll_to_fn, offset) = {
            let mut core = self.inner.borrow_mut();
            let frame = core.options.request_frame.clone();
            core.bridge.attach(
                element,
                (Rc::clone(&observe_rect), Rc::clone(&observe_offset)),
                frame,
            );
            (Rc::clone(&core.options.scroll_to_fn), core.scroll_offset)
        };
        vdebug!(offset, "scroll element attached");
        scroll_to_fn(offset, ScrollToFnOptions::default(), self);

        let owner = Rc::downgrade(&self.inner);
        let on_rect: RectCallback = Box::new(move |rect: Rect| {
            if let Some(virtualizer) = Self::upgrade(&owner) {
                virtualizer.handle_rect(rect);
            }
        });
        match observe_rect(self, on_rect) {
            Ok(unsubscribe) => self.keep_subscription(unsubscribe),
            Err(source) => {
                vwarn!(%source, "rect observer failed to register");
                self.cleanup();
                return Err(Error::Observe {
                    observer: ObserverKind::Rect,
                    source,
                });
            }
        }

        let owner = Rc::downgrade(&self.inner);
        let on_offset: OffsetCallback = Box::new(move |change: OffsetChange| {
            if let Some(virtualizer) = Self::upgrade(&owner) {
                virtualizer.handle_offset(change);
            }
        });
        match observe_offset(self, on_offset) {
            Ok(unsubscribe) => self.keep_subscription(unsubscribe),
            Err(source) => {
                vwarn!(%source, "offset observer failed to register");
                self.cleanup();
                return Err(Error::Observe {
                    observer: ObserverKind::Offset,
                    source,
                });
            }
        }
        Ok(())
    }

    fn keep_subscription(&self, unsubscribe: Unsubscribe) {
        let leftover = {
            let mut core = self.inner.borrow_mut();
            if core.bridge.is_live() {
                core.bridge.add_subscription(unsubscribe);
                None
            } else {
                // Torn down while the observer was registering.
                Some(unsubscribe)
            }
        };
        if let Some(unsubscribe) = leftover {
            unsubscribe();
        }
    }

    /// Tears down the observation bridge: unsubscribes the observers, releases every item
    /// observation, forgets the frame scheduler and cancels a pending scroll-to.
    ///
    /// Calling it again is a no-op. Pending frame callbacks become no-ops.
    pub fn unmount(&self) {
        let released = {
            let mut core = self.inner.borrow_mut();
            if core.bridge.lifecycle() == Lifecycle::Unmounted {
                return;
            }
            vdebug!("Virtualizer::unmount");
            core.bridge.set_lifecycle(Lifecycle::Unmounted);
            core.scroll.end_pending(ScrollToStatus::Cancelled);
            core.bridge.detach()
        };
        release_all(released);
        self.notify();
    }

    fn cleanup(&self) {
        let released = {
            let mut core = self.inner.borrow_mut();
            if core.scroll.end_pending(ScrollToStatus::Cancelled) {
                vdebug!("pending scroll-to cancelled by teardown");
            }
            core.bridge.detach_observers()
        };
        if !released.is_empty() {
            vtrace!(count = released.len(), "releasing registrations");
        }
        release_all(released);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().bridge.lifecycle() == Lifecycle::Mounted
    }

    fn handle_rect(&self, rect: Rect) {
        {
            let mut core = self.inner.borrow_mut();
            if !core.bridge.is_live() {
                return;
            }
            vtrace!(width = rect.width, height = rect.height, "scroll rect changed");
            core.scroll_rect = Some(rect);
        }
        self.notify();
    }

    fn handle_offset(&self, change: OffsetChange) {
        {
            let mut core = self.inner.borrow_mut();
            if !core.bridge.is_live() {
                return;
            }
            vtrace!(
                offset = change.offset,
                is_scrolling = change.is_scrolling,
                user_initiated = change.user_initiated,
                "scroll offset changed"
            );
            core.scroll_direction = if change.is_scrolling {
                if change.offset > core.scroll_offset {
                    Some(ScrollDirection::Forward)
                } else if change.offset < core.scroll_offset {
                    Some(ScrollDirection::Backward)
                } else {
                    core.scroll_direction
                }
            } else {
                None
            };
            core.scroll_adjustments = 0.0;
            core.scroll_offset = change.offset;
            core.is_scrolling = change.is_scrolling;
            if change.user_initiated && core.scroll.end_pending(ScrollToStatus::Cancelled) {
                vdebug!("pending scroll-to interrupted by user scroll");
            }
        }
        self.notify();
    }

    pub fn count(&self) -> usize {
        self.inner.borrow().options.count
    }

    pub fn lanes(&self) -> usize {
        self.inner.borrow().lanes
    }

    pub fn enabled(&self) -> bool {
        self.inner.borrow().options.enabled
    }

    pub fn is_scrolling(&self) -> bool {
        self.inner.borrow().is_scrolling
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.inner.borrow().scroll_direction
    }

    pub fn scroll_offset(&self) -> f64 {
        self.inner.borrow().scroll_offset
    }

    pub fn scroll_rect(&self) -> Option<Rect> {
        self.inner.borrow().scroll_rect
    }

    /// Extent of the viewport along the scroll axis; `0.0` while unknown or after teardown.
    pub fn viewport_size(&self) -> f64 {
        self.inner.borrow().viewport_size()
    }

    /// Total scrollable size: every item, gaps and both paddings. `0.0` when disabled.
    pub fn get_total_size(&self) -> f64 {
        self.inner.borrow().total_size()
    }

    pub fn max_scroll_offset(&self) -> f64 {
        self.inner.borrow().max_scroll_offset()
    }

    /// Geometry of every item, ordered by index. The slice is shared until the layout changes.
    pub fn measurements(&self) -> Rc<[Measurement]> {
        self.inner.borrow().layout.shared_items()
    }

    pub fn measurement(&self, index: usize) -> Option<Measurement> {
        self.inner.borrow().layout.get(index)
    }

    /// Items intersecting the viewport, without overscan.
    pub fn visible_range(&self) -> Option<VirtualRange> {
        self.inner.borrow().visible_range()
    }

    /// The visible range widened by overscan (whole rows when there are several lanes).
    pub fn virtual_range(&self) -> Option<VirtualRange> {
        self.inner
            .borrow()
            .extraction_range()
            .and_then(range::overscanned)
    }

    /// Indexes to render, after the range extractor.
    pub fn virtual_indexes(&self) -> Vec<usize> {
        self.inner.borrow().indexes()
    }

    /// Items to render.
    ///
    /// The result is memoized: as long as neither the rendered indexes nor the layout changed,
    /// the same allocation is returned (`Rc::ptr_eq` holds between calls).
    pub fn get_virtual_items(&self) -> Rc<[VirtualItem<K>]> {
        let mut core = self.inner.borrow_mut();
        let indexes = core.indexes();
        let layout_version = core.layout_version;
        if let Some(memo) = &core.items_memo {
            if memo.layout_version == layout_version && memo.indexes == indexes {
                return Rc::clone(&memo.items);
            }
        }

        let get_item_key = Rc::clone(&core.options.get_item_key);
        let items: Rc<[VirtualItem<K>]> = indexes
            .iter()
            .filter_map(|&index| core.layout.get(index))
            .map(|m| VirtualItem {
                key: get_item_key(m.index),
                index: m.index,
                lane: m.lane,
                start: m.start,
                size: m.size,
                end: m.end,
            })
            .collect();
        vtrace!(len = items.len(), "virtual items recomputed");
        core.items_memo = Some(ItemsMemo {
            layout_version,
            indexes,
            items: Rc::clone(&items),
        });
        items
    }

    /// The last item starting at or before `offset` (an absolute scroll offset).
    pub fn item_at_offset(&self, offset: f64) -> Option<Measurement> {
        let core = self.inner.borrow();
        if !core.options.enabled {
            return None;
        }
        let items = core.layout.items();
        let index = items
            .partition_point(|m| m.start <= offset)
            .saturating_sub(1);
        items.get(index).copied()
    }

    /// The clamped scroll offset that would bring `index` into view with `align`.
    pub fn offset_for_index(&self, index: usize, align: Align) -> Option<f64> {
        let core = self.inner.borrow();
        if !core.options.enabled {
            return None;
        }
        core.offset_for_index(index, align).map(|(offset, _)| offset)
    }

    /// Scrolls to an absolute offset, aligned and clamped like an item start.
    ///
    /// Completes synchronously: the handle is `Settled`, or `Cancelled` when not mounted.
    pub fn scroll_to_offset(&self, to_offset: f64, options: ScrollToOptions) -> ScrollToHandle {
        let (scroll_to_fn, offset, handle) = {
            let mut core = self.inner.borrow_mut();
            if !core.can_scroll() {
                vdebug!(to_offset, "scroll_to_offset ignored: not mounted");
                return core.scroll.record_finished(ScrollToStatus::Cancelled);
            }
            let offset = core
                .geometry()
                .offset_for_alignment(to_offset, options.align, 0.0);
            let handle = core.scroll.record_finished(ScrollToStatus::Settled);
            (Rc::clone(&core.options.scroll_to_fn), offset, handle)
        };
        vtrace!(offset, "scroll_to_offset");
        scroll_to_fn(
            offset,
            ScrollToFnOptions {
                adjustments: None,
                behavior: options.behavior,
            },
            self,
        );
        handle
    }

    /// Scrolls `index` into view.
    ///
    /// With dynamic measurement (a `measure_element` capability and rendered elements) and a
    /// frame scheduler, the position is re-checked on following frames until it is stable, a
    /// newer request supersedes it, the user scrolls, teardown happens, or `max_settle_frames`
    /// run out.
    pub fn scroll_to_index(&self, index: usize, options: ScrollToOptions) -> ScrollToHandle {
        let (scroll_to_fn, offset, generation, handle, dynamic) = {
            let mut core = self.inner.borrow_mut();
            if !core.can_scroll() {
                vdebug!(index, "scroll_to_index ignored: not mounted");
                return core.scroll.record_finished(ScrollToStatus::Cancelled);
            }
            let Some((offset, align)) = core.offset_for_index(index, options.align) else {
                vwarn!(index, "scroll_to_index on an empty list");
                return core.scroll.record_finished(ScrollToStatus::Cancelled);
            };
            let index = index.min(core.options.count.saturating_sub(1));
            let dynamic = core.is_dynamic();
            if dynamic && options.behavior == ScrollBehavior::Smooth {
                vwarn!("smooth scrolling is not fully supported with dynamic measurement");
            }
            let (generation, handle) = core.scroll.begin(index, align, options.behavior, offset);
            (
                Rc::clone(&core.options.scroll_to_fn),
                offset,
                generation,
                handle,
                dynamic,
            )
        };
        vtrace!(index, offset, generation, "scroll_to_index");
        scroll_to_fn(
            offset,
            ScrollToFnOptions {
                adjustments: None,
                behavior: options.behavior,
            },
            self,
        );

        if dynamic {
            self.schedule_settle(generation);
        } else {
            self.inner
                .borrow_mut()
                .scroll
                .finish(generation, ScrollToStatus::Settled);
        }
        handle
    }

    /// Status of the most recent scroll-to request.
    pub fn scroll_to_status(&self) -> ScrollToStatus {
        self.inner.borrow().scroll.latest_status()
    }

    pub fn is_scroll_pending(&self) -> bool {
        self.inner.borrow().scroll.is_pending()
    }

    fn schedule_settle(&self, generation: u64) {
        let request_frame = {
            let mut core = self.inner.borrow_mut();
            if !core.scroll.is_current(generation) {
                return;
            }
            match core.bridge.frame() {
                Some(request_frame) => request_frame,
                None => {
                    // Nothing to re-check on.
                    core.scroll.finish(generation, ScrollToStatus::Settled);
                    return;
                }
            }
        };
        let owner = Rc::downgrade(&self.inner);
        request_frame(Box::new(move || {
            if let Some(virtualizer) = Self::upgrade(&owner) {
                virtualizer.settle_frame(generation);
            }
        }));
    }

    fn settle_frame(&self, generation: u64) {
        let target = {
            let core = self.inner.borrow();
            if !core.bridge.has_frame() {
                return;
            }
            let Some(pending) = core.scroll.pending(generation) else {
                return;
            };
            let index = pending.index;
            core.options
                .measure_element
                .clone()
                .zip(core.bridge.element(index))
                .map(|(measure, element)| (index, measure, element))
        };
        if let Some((index, measure, element)) = target {
            let size = measure(&element, self);
            self.resize_item(index, size);
        }

        let (scroll_to_fn, offset, behavior) = {
            let mut core = self.inner.borrow_mut();
            if !core.bridge.has_frame() {
                return;
            }
            let Some(pending) = core.scroll.pending(generation) else {
                return;
            };
            let (index, align, last_offset, behavior) =
                (pending.index, pending.align, pending.last_offset, pending.behavior);
            let frames = pending.frames + 1;
            let Some((offset, _)) = core.offset_for_index(index, align) else {
                core.scroll.finish(generation, ScrollToStatus::Cancelled);
                return;
            };
            if approx_eq(offset, last_offset, core.options.settle_epsilon) {
                vtrace!(index, offset, frames, "scroll-to settled");
                core.scroll.finish(generation, ScrollToStatus::Settled);
                return;
            }
            if frames >= core.options.max_settle_frames {
                vwarn!(index, frames, "scroll-to did not settle; giving up");
                core.scroll.finish(generation, ScrollToStatus::Cancelled);
                return;
            }
            if let Some(pending) = core.scroll.pending_mut(generation) {
                pending.frames = frames;
                pending.last_offset = offset;
            }
            vtrace!(index, offset, frames, "scroll-to target moved");
            (Rc::clone(&core.options.scroll_to_fn), offset, behavior)
        };
        scroll_to_fn(
            offset,
            ScrollToFnOptions {
                adjustments: None,
                behavior,
            },
            self,
        );
        self.schedule_settle(generation);
    }

    /// Registers (`Some`) or releases (`None`) the rendered element of `index` and records its
    /// measured size.
    ///
    /// Requires the `measure_element` capability. With `observe_item_element` set, a new element
    /// is also observed and re-measured whenever the host reports a resize.
    pub fn measure_element(&self, index: usize, element: Option<E>) {
        let Some(element) = element else {
            let released = self.inner.borrow_mut().bridge.untrack(index);
            if let Some(release) = released {
                release();
            }
            return;
        };

        let (measure, observe, replaced) = {
            let mut core = self.inner.borrow_mut();
            if core.bridge.lifecycle() == Lifecycle::Unmounted {
                vtrace!(index, "measure_element after teardown ignored");
                return;
            }
            if index >= core.options.count {
                vwarn!(index, count = core.options.count, "measure_element: index out of range");
                return;
            }
            let Some(measure) = core.options.measure_element.clone() else {
                return;
            };
            let (is_new, replaced) = core.bridge.track(index, element.clone());
            let observe = if is_new {
                core.options.observe_item_element.clone()
            } else {
                None
            };
            (measure, observe, replaced)
        };
        if let Some(release) = replaced {
            release();
        }

        if let Some(observe) = observe {
            let owner = Rc::downgrade(&self.inner);
            let release = observe(
                &element,
                Box::new(move || {
                    if let Some(virtualizer) = Self::upgrade(&owner) {
                        virtualizer.remeasure(index);
                    }
                }),
            );
            let leftover = self
                .inner
                .borrow_mut()
                .bridge
                .attach_release(index, &element, release);
            if let Some(release) = leftover {
                release();
            }
        }

        let size = measure(&element, self);
        self.resize_item(index, size);
    }

    fn remeasure(&self, index: usize) {
        let target = {
            let core = self.inner.borrow();
            core.options
                .measure_element
                .clone()
                .zip(core.bridge.element(index))
        };
        if let Some((measure, element)) = target {
            let size = measure(&element, self);
            self.resize_item(index, size);
        }
    }

    /// Records the real size of `index` and rebuilds the layout.
    ///
    /// If the item starts above the current offset (or the
    /// `should_adjust_scroll_position_on_item_size_change` hook says so), the host is asked to
    /// compensate through `scroll_to_fn` with `adjustments`, so visible content does not jump.
    pub fn resize_item(&self, index: usize, size: f64) {
        let size = sanitize_size(index, size, "measure_element");
        let (item, delta, should_adjust) = {
            let mut core = self.inner.borrow_mut();
            if core.bridge.lifecycle() == Lifecycle::Unmounted {
                return;
            }
            let Some(item) = core.layout.get(index) else {
                return;
            };
            let delta = size - item.size;
            if delta == 0.0 {
                core.cache.set(index, size);
                return;
            }
            (
                item,
                delta,
                core.options
                    .should_adjust_scroll_position_on_item_size_change
                    .clone(),
            )
        };

        let adjust = match should_adjust {
            Some(should_adjust) => should_adjust(self, &item, delta),
            None => {
                let core = self.inner.borrow();
                item.start < core.scroll_offset + core.scroll_adjustments
            }
        };

        let adjustment = {
            let mut core = self.inner.borrow_mut();
            vtrace!(index, size, delta, adjust, "item resized");
            core.cache.set(index, size);
            core.rebuild_layout();
            if adjust && core.bridge.is_live() {
                core.scroll_adjustments += delta;
                Some((
                    Rc::clone(&core.options.scroll_to_fn),
                    core.scroll_offset,
                    core.scroll_adjustments,
                ))
            } else {
                None
            }
        };
        if let Some((scroll_to_fn, offset, adjustments)) = adjustment {
            scroll_to_fn(
                offset,
                ScrollToFnOptions {
                    adjustments: Some(adjustments),
                    behavior: ScrollBehavior::Auto,
                },
                self,
            );
        }
        self.notify();
    }

    /// Drops every cached measurement; items fall back to their estimates.
    pub fn reset_measurements(&self) {
        {
            let mut core = self.inner.borrow_mut();
            vdebug!(dropped = core.cache.len(), "measurements reset");
            core.cache.clear();
            core.rebuild_layout();
        }
        self.notify();
    }

    /// Drops cached measurements for `index` and everything after it.
    pub fn invalidate_measurements_from(&self, index: usize) {
        {
            let mut core = self.inner.borrow_mut();
            core.cache.invalidate_from(index);
            core.rebuild_layout();
        }
        self.notify();
    }

    pub fn measurement_cache_len(&self) -> usize {
        self.inner.borrow().cache.len()
    }

    pub fn is_measured(&self, index: usize) -> bool {
        self.inner.borrow().cache.contains(index)
    }
}

impl<S, E, K> fmt::Debug for Virtualizer<S, E, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(core) = self.inner.try_borrow() else {
            return f.write_str("Virtualizer { .. }");
        };
        f.debug_struct("Virtualizer")
            .field("options", &core.options)
            .field("lanes", &core.lanes)
            .field("lifecycle", &core.bridge.lifecycle())
            .field("scroll_rect", &core.scroll_rect)
            .field("scroll_offset", &core.scroll_offset)
            .field("is_scrolling", &core.is_scrolling)
            .field("scroll_direction", &core.scroll_direction)
            .field("measured", &core.cache.len())
            .field("pending_scroll", &core.scroll.is_pending())
            .finish_non_exhaustive()
    }
}
