use alloc::collections::BTreeMap;

/// Observed item sizes by index.
///
/// Only real measurements land here, never estimates. Entries survive lane-count changes: lane
/// membership is recomputed from positions on every layout rebuild.
#[derive(Clone, Debug, Default)]
pub(crate) struct MeasurementCache {
    sizes: BTreeMap<usize, f64>,
}

impl MeasurementCache {
    pub(crate) fn get(&self, index: usize) -> Option<f64> {
        self.sizes.get(&index).copied()
    }

    pub(crate) fn contains(&self, index: usize) -> bool {
        self.sizes.contains_key(&index)
    }

    /// Records an observed size, returning the previous one.
    pub(crate) fn set(&mut self, index: usize, size: f64) -> Option<f64> {
        self.sizes.insert(index, size)
    }

    /// Drops every entry at or beyond `index`.
    pub(crate) fn invalidate_from(&mut self, index: usize) {
        if index == 0 {
            self.sizes.clear();
            return;
        }
        drop(self.sizes.split_off(&index));
    }

    pub(crate) fn prune_to_count(&mut self, count: usize) {
        self.invalidate_from(count);
    }

    pub(crate) fn len(&self) -> usize {
        self.sizes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.sizes.clear();
    }
}
