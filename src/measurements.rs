use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use crate::Measurement;
use crate::cache::MeasurementCache;

/// Replaces a non-finite or negative size with `0.0`, logging the bad value.
pub(crate) fn sanitize_size(index: usize, size: f64, source: &'static str) -> f64 {
    if size.is_finite() && size >= 0.0 {
        return size;
    }
    vwarn!(index, size, source, "invalid item size; using 0");
    0.0
}

/// Replaces a non-finite or negative gap with `0.0`. A negative gap would let items in one lane
/// overlap and break the ordering the range search depends on.
pub(crate) fn sanitize_gap(gap: f64) -> f64 {
    if gap.is_finite() && gap >= 0.0 {
        return gap;
    }
    vwarn!(gap, "invalid gap; using 0");
    0.0
}

pub(crate) fn sanitize_lanes(lanes: usize) -> usize {
    if lanes == 0 {
        vwarn!("lanes must be at least 1; using 1");
        return 1;
    }
    lanes
}

pub(crate) struct LayoutInput<'a> {
    pub(crate) count: usize,
    pub(crate) lanes: usize,
    pub(crate) gap: f64,
    pub(crate) padding_start: f64,
    pub(crate) scroll_margin: f64,
    pub(crate) estimate_size: &'a dyn Fn(usize) -> f64,
    pub(crate) cache: &'a MeasurementCache,
}

/// The ordered item geometries for one configuration snapshot.
#[derive(Clone, Debug)]
pub(crate) struct Layout {
    items: Rc<[Measurement]>,
    lane_ends: Vec<Option<f64>>,
}

impl Layout {
    pub(crate) fn empty(lanes: usize) -> Self {
        Self {
            items: Rc::from(Vec::new()),
            lane_ends: vec![None; lanes.max(1)],
        }
    }

    /// Places every item from scratch, in index order.
    ///
    /// Lanes are assigned greedily: each item goes to the lane whose next free offset is smallest,
    /// ties going to the lowest lane. Nothing from a previous build is reused, so lane indexes are
    /// always within the current lane count.
    pub(crate) fn build(input: &LayoutInput<'_>) -> Self {
        let lanes = input.lanes.max(1);
        let base = input.padding_start + input.scroll_margin;
        let mut cursors = LaneCursors::new(lanes, base, sanitize_gap(input.gap));
        let mut items = Vec::with_capacity(input.count);

        for index in 0..input.count {
            let size = match input.cache.get(index) {
                Some(measured) => measured,
                None => sanitize_size(index, (input.estimate_size)(index), "estimate_size"),
            };
            let (lane, start) = cursors.place(size);
            items.push(Measurement {
                index,
                lane,
                start,
                size,
                end: start + size,
            });
        }

        vtrace!(count = input.count, lanes, "layout rebuilt");
        Self {
            items: items.into(),
            lane_ends: cursors.ends,
        }
    }

    pub(crate) fn items(&self) -> &[Measurement] {
        &self.items
    }

    pub(crate) fn shared_items(&self) -> Rc<[Measurement]> {
        Rc::clone(&self.items)
    }

    pub(crate) fn get(&self, index: usize) -> Option<Measurement> {
        self.items.get(index).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// The furthest item end over all lanes, or `None` when no item was placed.
    pub(crate) fn content_end(&self) -> Option<f64> {
        self.lane_ends
            .iter()
            .flatten()
            .copied()
            .reduce(f64::max)
    }
}

struct LaneCursors {
    next_start: Vec<f64>,
    ends: Vec<Option<f64>>,
    gap: f64,
}

impl LaneCursors {
    fn new(lanes: usize, base: f64, gap: f64) -> Self {
        Self {
            next_start: vec![base; lanes],
            ends: vec![None; lanes],
            gap,
        }
    }

    fn place(&mut self, size: f64) -> (usize, f64) {
        let mut lane = 0;
        for (i, &start) in self.next_start.iter().enumerate().skip(1) {
            if start < self.next_start[lane] {
                lane = i;
            }
        }
        let start = self.next_start[lane];
        let end = start + size;
        self.ends[lane] = Some(end);
        self.next_start[lane] = end + self.gap;
        (lane, start)
    }
}
