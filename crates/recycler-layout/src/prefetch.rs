//! How far beyond the visible region layouts prefetch.

/// Strategy for prefetching items beyond the visible area.
///
/// The engine prefetches in idle slices until the realized content reaches
/// [`buffer_extent`](Self::buffer_extent) past the viewport edge.
#[derive(Clone, Debug, PartialEq)]
pub struct PrefetchStrategy {
    /// Number of items to prefetch beyond the visible area.
    pub prefetch_count: usize,

    /// Whether prefetching is enabled.
    pub enabled: bool,
}

impl Default for PrefetchStrategy {
    fn default() -> Self {
        Self {
            prefetch_count: 2,
            enabled: true,
        }
    }
}

impl PrefetchStrategy {
    pub fn new(prefetch_count: usize) -> Self {
        Self {
            prefetch_count,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            prefetch_count: 0,
            enabled: false,
        }
    }

    /// Length of the prefetch buffer for items of `item_extent` (size plus
    /// spacing) along the axis.
    pub fn buffer_extent(&self, item_extent: f32) -> f32 {
        if !self.enabled || !item_extent.is_finite() || item_extent <= 0.0 {
            return 0.0;
        }
        self.prefetch_count as f32 * item_extent
    }
}

#[cfg(test)]
#[path = "tests/prefetch_tests.rs"]
mod tests;
