use alloc::vec;

use crate::{Measurement, Range, VirtualRange};

/// Finds the inclusive window of items intersecting `[scroll_offset, scroll_offset + viewport)`.
///
/// `items` must be sorted by index; starts are non-decreasing by index for any lane count, and
/// ends are too when there is a single lane, so both bounds are found by binary search. With
/// several lanes the window is widened to whole rows.
pub(crate) fn visible_range(
    items: &[Measurement],
    lanes: usize,
    scroll_offset: f64,
    viewport: f64,
) -> Option<VirtualRange> {
    if items.is_empty() || viewport <= 0.0 {
        return None;
    }
    let last = items.len() - 1;
    let lanes = lanes.max(1);
    if items.len() <= lanes {
        return Some(VirtualRange {
            start_index: 0,
            end_index: last,
        });
    }

    let view_end = scroll_offset + viewport;
    // Highest index whose start lies before the end of the viewport.
    let end = items.partition_point(|m| m.start < view_end).checked_sub(1)?;

    if lanes == 1 {
        // Lowest index whose end lies past the start of the viewport.
        let start = items.partition_point(|m| m.end <= scroll_offset).min(end);
        return Some(VirtualRange {
            start_index: start,
            end_index: end,
        });
    }

    let start = lane_start(items, lanes, scroll_offset, end);
    let start = start - start % lanes;
    let end = last.min(end + (lanes - 1 - end % lanes));
    Some(VirtualRange {
        start_index: start,
        end_index: end,
    })
}

/// Walks back from the last item starting at or before `scroll_offset` until every lane has been
/// seen starting at or before it. Items from other lanes placed earlier may still reach into the
/// viewport, so the plain binary search result is not enough.
fn lane_start(items: &[Measurement], lanes: usize, scroll_offset: f64, end: usize) -> usize {
    let anchor = items
        .partition_point(|m| m.start <= scroll_offset)
        .saturating_sub(1)
        .min(end);
    let mut seen = vec![false; lanes];
    let mut pending = lanes;
    let mut index = anchor;
    loop {
        let item = &items[index];
        if item.start <= scroll_offset && !seen[item.lane] {
            seen[item.lane] = true;
            pending -= 1;
        }
        if pending == 0 || index == 0 {
            return index;
        }
        index -= 1;
    }
}

/// Applies overscan to a visible window, clamped to `[0, count - 1]`.
pub(crate) fn overscanned(range: Range) -> Option<VirtualRange> {
    if range.count == 0 {
        return None;
    }
    Some(VirtualRange {
        start_index: range.start_index.saturating_sub(range.overscan),
        end_index: range
            .end_index
            .saturating_add(range.overscan)
            .min(range.count - 1),
    })
}
