//! Scroll-to bookkeeping and alignment math.
//!
//! At most one scroll-to operation is pending. It moves from `Requested` to exactly one of
//! `Settled`, `Superseded` or `Cancelled`; the outcome is shared with the caller through a
//! [`ScrollToHandle`].

use alloc::rc::Rc;
use core::cell::Cell;

use crate::{Align, Measurement, ScrollBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollToStatus {
    /// No scroll-to operation has been requested yet.
    Idle,
    /// The scroll function was invoked and the item position is still being re-checked.
    Requested,
    /// The target position is stable.
    Settled,
    /// A newer scroll-to request replaced this one.
    Superseded,
    /// Torn down, interrupted by a user scroll, or out of settle frames.
    Cancelled,
}

/// Tracks the outcome of one `scroll_to_*` call.
#[derive(Clone, Debug)]
pub struct ScrollToHandle {
    status: Rc<Cell<ScrollToStatus>>,
}

impl ScrollToHandle {
    pub(crate) fn finished(status: ScrollToStatus) -> Self {
        Self {
            status: Rc::new(Cell::new(status)),
        }
    }

    pub fn status(&self) -> ScrollToStatus {
        self.status.get()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == ScrollToStatus::Requested
    }
}

pub(crate) struct PendingScroll {
    pub(crate) generation: u64,
    pub(crate) index: usize,
    pub(crate) align: Align,
    pub(crate) behavior: ScrollBehavior,
    pub(crate) last_offset: f64,
    pub(crate) frames: u32,
    status: Rc<Cell<ScrollToStatus>>,
}

#[derive(Default)]
pub(crate) struct ScrollController {
    pending: Option<PendingScroll>,
    latest: Option<Rc<Cell<ScrollToStatus>>>,
    generation: u64,
}

impl ScrollController {
    /// Starts a new index operation, superseding the pending one.
    pub(crate) fn begin(
        &mut self,
        index: usize,
        align: Align,
        behavior: ScrollBehavior,
        offset: f64,
    ) -> (u64, ScrollToHandle) {
        self.end_pending(ScrollToStatus::Superseded);
        self.generation = self.generation.wrapping_add(1);
        let status = Rc::new(Cell::new(ScrollToStatus::Requested));
        self.pending = Some(PendingScroll {
            generation: self.generation,
            index,
            align,
            behavior,
            last_offset: offset,
            frames: 0,
            status: Rc::clone(&status),
        });
        self.latest = Some(Rc::clone(&status));
        (self.generation, ScrollToHandle { status })
    }

    /// Records an operation that completed synchronously (offset targets, no-ops).
    pub(crate) fn record_finished(&mut self, status: ScrollToStatus) -> ScrollToHandle {
        self.end_pending(ScrollToStatus::Superseded);
        let handle = ScrollToHandle::finished(status);
        self.latest = Some(Rc::clone(&handle.status));
        handle
    }

    /// Ends the pending operation, if any, with `status`. Returns whether one was pending.
    pub(crate) fn end_pending(&mut self, status: ScrollToStatus) -> bool {
        match self.pending.take() {
            Some(pending) => {
                vtrace!(generation = pending.generation, ?status, "scroll-to ended");
                pending.status.set(status);
                true
            }
            None => false,
        }
    }

    /// Ends the operation `generation` if it is still the pending one.
    pub(crate) fn finish(&mut self, generation: u64, status: ScrollToStatus) {
        if self.is_current(generation) {
            self.end_pending(status);
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
    }

    pub(crate) fn pending(&self, generation: u64) -> Option<&PendingScroll> {
        self.pending
            .as_ref()
            .filter(|pending| pending.generation == generation)
    }

    pub(crate) fn pending_mut(&mut self, generation: u64) -> Option<&mut PendingScroll> {
        self.pending
            .as_mut()
            .filter(|pending| pending.generation == generation)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn latest_status(&self) -> ScrollToStatus {
        self.latest
            .as_ref()
            .map_or(ScrollToStatus::Idle, |status| status.get())
    }
}

/// Viewport geometry needed to turn targets into scroll offsets.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScrollGeometry {
    pub(crate) offset: f64,
    pub(crate) viewport: f64,
    pub(crate) max_offset: f64,
    pub(crate) scroll_padding_start: f64,
    pub(crate) scroll_padding_end: f64,
}

impl ScrollGeometry {
    /// Maps a raw target offset to a clamped scroll offset for `align`.
    ///
    /// `Auto` becomes `End` when the target lies past the viewport, `Start` otherwise.
    pub(crate) fn offset_for_alignment(&self, to_offset: f64, align: Align, item_size: f64) -> f64 {
        let align = match align {
            Align::Auto if to_offset >= self.offset + self.viewport => Align::End,
            Align::Auto => Align::Start,
            other => other,
        };
        let target = match align {
            Align::Center => to_offset + (item_size - self.viewport) / 2.0,
            Align::End => to_offset - self.viewport,
            Align::Start | Align::Auto => to_offset,
        };
        target.min(self.max_offset).max(0.0)
    }

    /// The scroll offset that brings `item` into view, and the alignment it resolved to.
    ///
    /// With `Auto`, an item already fully visible keeps the current offset; otherwise the item is
    /// aligned to the nearest edge.
    pub(crate) fn offset_for_item(&self, item: &Measurement, align: Align) -> (f64, Align) {
        let align = match align {
            Align::Auto => {
                let view_end = self.offset + self.viewport;
                if item.start >= self.offset && item.end <= view_end {
                    return (self.offset, Align::Auto);
                } else if item.start < self.offset {
                    Align::Start
                } else {
                    Align::End
                }
            }
            other => other,
        };
        let to_offset = match align {
            Align::End => item.end + self.scroll_padding_end,
            _ => item.start - self.scroll_padding_start,
        };
        (self.offset_for_alignment(to_offset, align, item.size), align)
    }
}

impl Drop for ScrollController {
    fn drop(&mut self) {
        self.end_pending(ScrollToStatus::Cancelled);
    }
}

pub(crate) fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    let delta = a - b;
    delta < epsilon && delta > -epsilon
}
