//! A headless windowing engine for very long lists, grids and masonry layouts.
//!
//! Given an item count, a size estimator and the viewport reported by the host, the engine decides
//! which items to render and where: it keeps a per-index measurement cache, places items across
//! one or more lanes, selects the visible window by binary search and projects it into
//! [`VirtualItem`]s.
//!
//! It holds no UI objects. The host injects its capabilities through [`VirtualizerOptions`]:
//! - the scroll element lookup and a scroll function
//! - rect and offset observers for the scroll element
//! - optionally, item measurement, per-item resize observation and an animation-frame scheduler
//!
//! Scroll-to requests return a [`ScrollToHandle`]; with dynamic measurement they settle over
//! several frames and are cancelled cleanly when the virtualizer is torn down.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod bridge;
mod cache;
mod emitter;
mod error;
mod measurements;
mod options;
mod range;
mod scroll;
mod types;
mod virtualizer;


pub use emitter::{IndexEmitter, default_range_extractor};
pub use error::{Error, ObserveError, ObserverKind};
pub use options::{
    EstimateSizeFn, FrameCallback, GetItemKeyFn, GetScrollElementFn, InitialOffset,
    ItemResizeCallback, MeasureElementFn, ObserveItemFn, ObserveOffsetFn, ObserveRectFn,
    OffsetCallback, OnChangeCallback, RangeExtractor, RectCallback, RequestFrameFn, ScrollToFn,
    ShouldAdjustScrollPositionOnItemSizeChangeCallback, Unsubscribe, VirtualizerOptions,
};
pub use scroll::{ScrollToHandle, ScrollToStatus};
pub use types::{
    Align, ItemKey, Measurement, OffsetChange, Range, Rect, ScrollBehavior, ScrollDirection,
    ScrollToFnOptions, ScrollToOptions, VirtualItem, VirtualRange,
};
pub use virtualizer::Virtualizer;
