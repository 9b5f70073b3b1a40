use crate::Range;
use crate::range::overscanned;

/// Helper to build correct range extractors without allocations.
///
/// It enforces the extractor contract:
/// - Out-of-bounds indexes are ignored (and debug-asserted).
/// - Duplicates are ignored.
/// - Out-of-order indexes are ignored (and debug-asserted).
///
/// The engine routes every extractor through one of these, so a misbehaving extractor can never
/// produce an out-of-bounds item.
pub struct IndexEmitter<'a> {
    range: Range,
    last: Option<usize>,
    emit: &'a mut dyn FnMut(usize),
}

impl<'a> IndexEmitter<'a> {
    pub fn new(range: Range, emit: &'a mut dyn FnMut(usize)) -> Self {
        Self {
            range,
            last: None,
            emit,
        }
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn emit(&mut self, index: usize) {
        if index >= self.range.count {
            vwarn!(
                index,
                count = self.range.count,
                "IndexEmitter: out-of-bounds index"
            );
            debug_assert!(
                index < self.range.count,
                "IndexEmitter: out-of-bounds index (i={index}, count={})",
                self.range.count
            );
            return;
        }

        if let Some(prev) = self.last {
            if index == prev {
                return;
            }
            if index < prev {
                vwarn!(
                    prev,
                    next = index,
                    "IndexEmitter: indexes must be emitted in ascending order"
                );
                debug_assert!(
                    index > prev,
                    "IndexEmitter: indexes must be emitted in ascending order (prev={prev}, next={index})"
                );
                return;
            }
        }

        self.last = Some(index);
        (self.emit)(index);
    }

    /// Emits an index outside the computed window, e.g. a sticky header.
    pub fn emit_pinned(&mut self, index: usize) {
        self.emit(index);
    }

    /// Emits `start_index..=end_index`, clamped to the item count.
    pub fn emit_range(&mut self, start_index: usize, end_index: usize) {
        if self.range.count == 0 {
            return;
        }
        let end = end_index.min(self.range.count - 1);
        for i in start_index..=end {
            self.emit(i);
        }
    }

    pub fn emit_visible(&mut self) {
        self.emit_range(self.range.start_index, self.range.end_index);
    }

    pub fn emit_overscanned(&mut self) {
        if let Some(window) = overscanned(self.range) {
            self.emit_range(window.start_index, window.end_index);
        }
    }
}

/// The extractor used when none is configured: the visible window plus overscan.
pub fn default_range_extractor(range: Range, emit: &mut dyn FnMut(usize)) {
    IndexEmitter::new(range, emit).emit_overscanned();
}
