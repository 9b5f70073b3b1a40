use alloc::boxed::Box;
use alloc::rc::Rc;

use crate::{
    ItemKey, Measurement, ObserveError, OffsetChange, Range, Rect, ScrollToFnOptions, Virtualizer,
};

/// Releases a registration made by the host. Called at most once.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Receives the scroll element's size.
pub type RectCallback = Box<dyn Fn(Rect)>;

/// Receives the scroll element's offset.
pub type OffsetCallback = Box<dyn Fn(OffsetChange)>;

/// Told that an observed item element changed size; the engine re-measures it.
pub type ItemResizeCallback = Box<dyn Fn()>;

/// A callback queued for the next animation frame.
pub type FrameCallback = Box<dyn FnOnce()>;

pub type EstimateSizeFn = Rc<dyn Fn(usize) -> f64>;

pub type GetItemKeyFn<K> = Rc<dyn Fn(usize) -> K>;

pub type GetScrollElementFn<S> = Rc<dyn Fn() -> Option<S>>;

/// Performs the actual scroll on the host surface.
pub type ScrollToFn<S, E, K> = Rc<dyn Fn(f64, ScrollToFnOptions, &Virtualizer<S, E, K>)>;

/// Registers a size observer on the scroll element.
///
/// Implementations usually report the current rect synchronously before returning.
pub type ObserveRectFn<S, E, K> =
    Rc<dyn Fn(&Virtualizer<S, E, K>, RectCallback) -> Result<Unsubscribe, ObserveError>>;

/// Registers an offset observer on the scroll element.
pub type ObserveOffsetFn<S, E, K> =
    Rc<dyn Fn(&Virtualizer<S, E, K>, OffsetCallback) -> Result<Unsubscribe, ObserveError>>;

/// Reads the real main-axis size of a rendered item element. Enables dynamic measurement.
pub type MeasureElementFn<S, E, K> = Rc<dyn Fn(&E, &Virtualizer<S, E, K>) -> f64>;

/// Registers a size observer on one rendered item element.
pub type ObserveItemFn<E> = Rc<dyn Fn(&E, ItemResizeCallback) -> Unsubscribe>;

/// Schedules a callback for the next animation frame.
pub type RequestFrameFn = Rc<dyn Fn(FrameCallback)>;

/// A callback fired when the rendered window, measurements or scrolling state change.
///
/// The second argument is `is_scrolling`.
pub type OnChangeCallback<S, E, K> = Rc<dyn Fn(&Virtualizer<S, E, K>, bool)>;

/// Decides whether to compensate the scroll position when an item size changes.
///
/// Receives the item as it was before the change and the size delta.
pub type ShouldAdjustScrollPositionOnItemSizeChangeCallback<S, E, K> =
    Rc<dyn Fn(&Virtualizer<S, E, K>, &Measurement, f64) -> bool>;

/// A callback that emits virtual item indexes for a given visible range.
///
/// Contract:
/// - `emit(i)` must be called with `i < range.count`.
/// - The emitted indexes must be sorted ascending; duplicates are allowed but ignored.
///
/// Tip: use [`crate::IndexEmitter`] to enforce the contract.
pub type RangeExtractor = Rc<dyn Fn(Range, &mut dyn FnMut(usize))>;

/// Initial scroll offset configuration.
#[derive(Clone)]
pub enum InitialOffset {
    Value(f64),
    /// Evaluated by `Virtualizer::new` and whenever the scroll state is reset. Runs while the
    /// engine state is borrowed, so it must not call back into the virtualizer.
    Provider(Rc<dyn Fn() -> f64>),
}

impl InitialOffset {
    pub(crate) fn resolve(&self) -> f64 {
        match self {
            Self::Value(v) => *v,
            Self::Provider(f) => f(),
        }
    }
}

impl Default for InitialOffset {
    fn default() -> Self {
        Self::Value(0.0)
    }
}

impl core::fmt::Debug for InitialOffset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Configuration for [`crate::Virtualizer`].
///
/// `S` is the host's scroll element handle, `E` its item element handle and `K` the item key.
/// Closures are stored in `Rc`s so that cloning is cheap and closure identity survives
/// `Virtualizer::update_options`; replacing `estimate_size` with a new closure invalidates the
/// measurement cache.
///
/// `estimate_size`, `get_item_key`, `range_extractor` and an [`InitialOffset::Provider`] must be
/// pure functions of their arguments; they run while the engine state is borrowed and must not
/// call back into the virtualizer. Every other callback may.
pub struct VirtualizerOptions<S, E, K = ItemKey> {
    pub count: usize,
    pub estimate_size: EstimateSizeFn,
    pub get_item_key: GetItemKeyFn<K>,

    pub get_scroll_element: GetScrollElementFn<S>,
    pub scroll_to_fn: ScrollToFn<S, E, K>,
    pub observe_element_rect: ObserveRectFn<S, E, K>,
    pub observe_element_offset: ObserveOffsetFn<S, E, K>,

    /// Reads the real size of a rendered item. When set, `Virtualizer::measure_element` tracks
    /// item elements and scroll-to operations settle over several frames.
    pub measure_element: Option<MeasureElementFn<S, E, K>>,
    /// Optional per-item resize observation for elements passed to `measure_element`.
    pub observe_item_element: Option<ObserveItemFn<E>>,
    /// The host's animation-frame facility. Captured at mount and released at teardown.
    pub request_frame: Option<RequestFrameFn>,

    /// Optional index selection hook, e.g. for sticky rows.
    ///
    /// The extractor receives the *visible* range (no overscan) plus `overscan` and `count`, and
    /// must emit a sorted (ascending) sequence of indexes.
    pub range_extractor: Option<RangeExtractor>,

    /// Enables/disables the virtualizer. When disabled, query methods return empty results.
    pub enabled: bool,

    /// Number of parallel tracks items are distributed across. `0` is treated as `1`.
    pub lanes: usize,
    /// Extra rows rendered before and after the visible window.
    pub overscan: usize,
    /// Scroll along the x axis instead of the y axis.
    pub horizontal: bool,

    /// The viewport size used before the rect observer reports one.
    pub initial_rect: Option<Rect>,
    pub initial_offset: InitialOffset,

    /// Padding before the first item.
    pub padding_start: f64,
    /// Padding after the last item.
    pub padding_end: f64,

    /// Additional padding applied when computing scroll-to offsets.
    pub scroll_padding_start: f64,
    /// Additional padding applied when computing scroll-to offsets.
    pub scroll_padding_end: f64,

    /// Where the list starts inside the scroll element, e.g. below a page header when the whole
    /// window scrolls.
    pub scroll_margin: f64,

    /// Space between consecutive items of the same lane.
    pub gap: f64,

    pub on_change: Option<OnChangeCallback<S, E, K>>,

    pub should_adjust_scroll_position_on_item_size_change:
        Option<ShouldAdjustScrollPositionOnItemSizeChangeCallback<S, E, K>>,

    /// Offsets closer than this are considered equal while a scroll-to operation settles.
    pub settle_epsilon: f64,
    /// Maximum number of animation frames a scroll-to operation may spend settling.
    pub max_settle_frames: u32,
}

impl<S, E, K> Clone for VirtualizerOptions<S, E, K> {
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            estimate_size: Rc::clone(&self.estimate_size),
            get_item_key: Rc::clone(&self.get_item_key),
            get_scroll_element: Rc::clone(&self.get_scroll_element),
            scroll_to_fn: Rc::clone(&self.scroll_to_fn),
            observe_element_rect: Rc::clone(&self.observe_element_rect),
            observe_element_offset: Rc::clone(&self.observe_element_offset),
            measure_element: self.measure_element.clone(),
            observe_item_element: self.observe_item_element.clone(),
            request_frame: self.request_frame.clone(),
            range_extractor: self.range_extractor.clone(),
            enabled: self.enabled,
            lanes: self.lanes,
            overscan: self.overscan,
            horizontal: self.horizontal,
            initial_rect: self.initial_rect,
            initial_offset: self.initial_offset.clone(),
            padding_start: self.padding_start,
            padding_end: self.padding_end,
            scroll_padding_start: self.scroll_padding_start,
            scroll_padding_end: self.scroll_padding_end,
            scroll_margin: self.scroll_margin,
            gap: self.gap,
            on_change: self.on_change.clone(),
            should_adjust_scroll_position_on_item_size_change: self
                .should_adjust_scroll_position_on_item_size_change
                .clone(),
            settle_epsilon: self.settle_epsilon,
            max_settle_frames: self.max_settle_frames,
        }
    }
}

impl<S: 'static, E: 'static> VirtualizerOptions<S, E, ItemKey> {
    /// Creates options for a list keyed by index (`ItemKey = u64`).
    ///
    /// `estimate_size(i)` returns the estimated item size in the scroll axis; it is used until the
    /// item is measured. The remaining arguments are the host capabilities every virtualizer
    /// needs: the scroll element lookup, the scroll function and the two observers.
    pub fn new(
        count: usize,
        estimate_size: impl Fn(usize) -> f64 + 'static,
        get_scroll_element: impl Fn() -> Option<S> + 'static,
        scroll_to_fn: impl Fn(f64, ScrollToFnOptions, &Virtualizer<S, E>) + 'static,
        observe_element_rect: impl Fn(&Virtualizer<S, E>, RectCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
        observe_element_offset: impl Fn(&Virtualizer<S, E>, OffsetCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
    ) -> Self {
        Self::new_with_key(
            count,
            estimate_size,
            |i| i as u64,
            get_scroll_element,
            scroll_to_fn,
            observe_element_rect,
            observe_element_offset,
        )
    }
}

impl<S: 'static, E: 'static, K: 'static> VirtualizerOptions<S, E, K> {
    /// Creates options with a custom key mapping.
    ///
    /// `get_item_key(i)` should return a stable identity for the item at index `i`; it is exposed
    /// as `VirtualItem::key` so hosts can reuse rendered nodes across reorders.
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_key(
        count: usize,
        estimate_size: impl Fn(usize) -> f64 + 'static,
        get_item_key: impl Fn(usize) -> K + 'static,
        get_scroll_element: impl Fn() -> Option<S> + 'static,
        scroll_to_fn: impl Fn(f64, ScrollToFnOptions, &Virtualizer<S, E, K>) + 'static,
        observe_element_rect: impl Fn(&Virtualizer<S, E, K>, RectCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
        observe_element_offset: impl Fn(&Virtualizer<S, E, K>, OffsetCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
    ) -> Self {
        Self {
            count,
            estimate_size: Rc::new(estimate_size),
            get_item_key: Rc::new(get_item_key),
            get_scroll_element: Rc::new(get_scroll_element),
            scroll_to_fn: Rc::new(scroll_to_fn),
            observe_element_rect: Rc::new(observe_element_rect),
            observe_element_offset: Rc::new(observe_element_offset),
            measure_element: None,
            observe_item_element: None,
            request_frame: None,
            range_extractor: None,
            enabled: true,
            lanes: 1,
            overscan: 1,
            horizontal: false,
            initial_rect: None,
            initial_offset: InitialOffset::default(),
            padding_start: 0.0,
            padding_end: 0.0,
            scroll_padding_start: 0.0,
            scroll_padding_end: 0.0,
            scroll_margin: 0.0,
            gap: 0.0,
            on_change: None,
            should_adjust_scroll_position_on_item_size_change: None,
            settle_epsilon: 1.01,
            max_settle_frames: 10,
        }
    }

    /// Replaces the estimator. The new closure has a new identity, so cached measurements are
    /// dropped when these options are applied to an existing virtualizer.
    pub fn with_estimate_size(mut self, estimate_size: impl Fn(usize) -> f64 + 'static) -> Self {
        self.estimate_size = Rc::new(estimate_size);
        self
    }

    pub fn with_get_item_key(mut self, get_item_key: impl Fn(usize) -> K + 'static) -> Self {
        self.get_item_key = Rc::new(get_item_key);
        self
    }

    pub fn with_get_scroll_element(
        mut self,
        get_scroll_element: impl Fn() -> Option<S> + 'static,
    ) -> Self {
        self.get_scroll_element = Rc::new(get_scroll_element);
        self
    }

    pub fn with_scroll_to_fn(
        mut self,
        scroll_to_fn: impl Fn(f64, ScrollToFnOptions, &Virtualizer<S, E, K>) + 'static,
    ) -> Self {
        self.scroll_to_fn = Rc::new(scroll_to_fn);
        self
    }

    pub fn with_observe_element_rect(
        mut self,
        observe: impl Fn(&Virtualizer<S, E, K>, RectCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
    ) -> Self {
        self.observe_element_rect = Rc::new(observe);
        self
    }

    pub fn with_observe_element_offset(
        mut self,
        observe: impl Fn(&Virtualizer<S, E, K>, OffsetCallback) -> Result<Unsubscribe, ObserveError>
        + 'static,
    ) -> Self {
        self.observe_element_offset = Rc::new(observe);
        self
    }

    pub fn with_measure_element(
        mut self,
        measure_element: Option<impl Fn(&E, &Virtualizer<S, E, K>) -> f64 + 'static>,
    ) -> Self {
        self.measure_element = measure_element.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_observe_item_element(
        mut self,
        observe: Option<impl Fn(&E, ItemResizeCallback) -> Unsubscribe + 'static>,
    ) -> Self {
        self.observe_item_element = observe.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_request_frame(
        mut self,
        request_frame: Option<impl Fn(FrameCallback) + 'static>,
    ) -> Self {
        self.request_frame = request_frame.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_range_extractor(
        mut self,
        range_extractor: Option<impl Fn(Range, &mut dyn FnMut(usize)) + 'static>,
    ) -> Self {
        self.range_extractor = range_extractor.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_horizontal(mut self, horizontal: bool) -> Self {
        self.horizontal = horizontal;
        self
    }

    /// Sets the initial viewport rectangle.
    pub fn with_initial_rect(mut self, initial_rect: Option<Rect>) -> Self {
        self.initial_rect = initial_rect;
        self
    }

    pub fn with_initial_offset(mut self, initial_offset: InitialOffset) -> Self {
        self.initial_offset = initial_offset;
        self
    }

    pub fn with_initial_offset_value(mut self, initial_offset: f64) -> Self {
        self.initial_offset = InitialOffset::Value(initial_offset);
        self
    }

    pub fn with_initial_offset_provider(
        mut self,
        initial_offset: impl Fn() -> f64 + 'static,
    ) -> Self {
        self.initial_offset = InitialOffset::Provider(Rc::new(initial_offset));
        self
    }

    pub fn with_padding(mut self, padding_start: f64, padding_end: f64) -> Self {
        self.padding_start = padding_start;
        self.padding_end = padding_end;
        self
    }

    pub fn with_scroll_padding(mut self, scroll_padding_start: f64, scroll_padding_end: f64) -> Self {
        self.scroll_padding_start = scroll_padding_start;
        self.scroll_padding_end = scroll_padding_end;
        self
    }

    pub fn with_scroll_margin(mut self, scroll_margin: f64) -> Self {
        self.scroll_margin = scroll_margin;
        self
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_on_change(
        mut self,
        on_change: Option<impl Fn(&Virtualizer<S, E, K>, bool) + 'static>,
    ) -> Self {
        self.on_change = on_change.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_should_adjust_scroll_position_on_item_size_change(
        mut self,
        f: Option<impl Fn(&Virtualizer<S, E, K>, &Measurement, f64) -> bool + 'static>,
    ) -> Self {
        self.should_adjust_scroll_position_on_item_size_change = f.map(|f| Rc::new(f) as _);
        self
    }

    pub fn with_settle_epsilon(mut self, settle_epsilon: f64) -> Self {
        self.settle_epsilon = settle_epsilon;
        self
    }

    pub fn with_max_settle_frames(mut self, max_settle_frames: u32) -> Self {
        self.max_settle_frames = max_settle_frames;
        self
    }
}

impl<S, E, K> core::fmt::Debug for VirtualizerOptions<S, E, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualizerOptions")
            .field("count", &self.count)
            .field("enabled", &self.enabled)
            .field("lanes", &self.lanes)
            .field("overscan", &self.overscan)
            .field("horizontal", &self.horizontal)
            .field("dynamic", &self.measure_element.is_some())
            .field("initial_rect", &self.initial_rect)
            .field("initial_offset", &self.initial_offset)
            .field("padding_start", &self.padding_start)
            .field("padding_end", &self.padding_end)
            .field("scroll_padding_start", &self.scroll_padding_start)
            .field("scroll_padding_end", &self.scroll_padding_end)
            .field("scroll_margin", &self.scroll_margin)
            .field("gap", &self.gap)
            .field("settle_epsilon", &self.settle_epsilon)
            .field("max_settle_frames", &self.max_settle_frames)
            .finish_non_exhaustive()
    }
}
