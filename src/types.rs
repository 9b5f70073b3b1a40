#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Align {
    Start,
    Center,
    End,
    #[default]
    Auto,
}

/// How the host should perform a programmatic scroll. Interpreted by `scroll_to_fn`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
    Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Forward,
    Backward,
}

/// Size of the scrollable surface as reported by the rect observer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Extent along the scroll axis.
    pub fn main(&self, horizontal: bool) -> f64 {
        if horizontal { self.width } else { self.height }
    }
}

/// Geometry of one item for the current configuration snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    pub index: usize,
    pub lane: usize,
    /// Start offset in the scroll axis (includes `scroll_margin` and `padding_start`).
    pub start: f64,
    /// Size in the scroll axis (excludes `gap`).
    pub size: f64,
    pub end: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualItem<K = ItemKey> {
    pub key: K,
    pub index: usize,
    pub lane: usize,
    /// Start offset in the scroll axis (includes `scroll_margin` and `padding_start`).
    pub start: f64,
    /// Size in the scroll axis (excludes `gap`).
    pub size: f64,
    pub end: f64,
}

pub type ItemKey = u64;

/// An inclusive index window. An empty window is represented as `None` by every query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualRange {
    pub start_index: usize,
    pub end_index: usize, // inclusive
}

impl VirtualRange {
    /// Number of indexes in the range; `0` for an inverted range.
    pub fn len(&self) -> usize {
        if self.start_index > self.end_index {
            return 0;
        }
        self.end_index - self.start_index + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }
}

/// Input handed to a range extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub start_index: usize,
    pub end_index: usize, // inclusive, visible range (no overscan)
    /// Overscan in items. Already multiplied by the lane count so whole rows are kept.
    pub overscan: usize,
    pub count: usize,
}

/// Payload of a scroll-offset notification.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetChange {
    pub offset: f64,
    pub is_scrolling: bool,
    /// Set when the change came from the user (wheel, drag, keyboard). A user scroll cancels any
    /// pending scroll-to operation.
    pub user_initiated: bool,
}

impl OffsetChange {
    pub fn new(offset: f64, is_scrolling: bool) -> Self {
        Self {
            offset,
            is_scrolling,
            user_initiated: false,
        }
    }

    pub fn from_user(offset: f64, is_scrolling: bool) -> Self {
        Self {
            offset,
            is_scrolling,
            user_initiated: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollToOptions {
    pub align: Align,
    pub behavior: ScrollBehavior,
}

impl ScrollToOptions {
    pub fn with_align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn with_behavior(mut self, behavior: ScrollBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

/// Arguments passed to the host's `scroll_to_fn`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollToFnOptions {
    /// Pending size-change compensation; the host should scroll to `offset + adjustments`.
    pub adjustments: Option<f64>,
    pub behavior: ScrollBehavior,
}
