//! Viewport geometry along one recycling axis.
//!
//! [`ViewportHandler`] validates raw viewport sizes and substitutes a bounded
//! estimate when a layout is placed in an unconstrained parent.
//! [`Viewport`] answers the coverage questions every adapter policy asks.

use recycler_core::{Anchor, Direction, Meta, WindowExtent, DEFAULT_ITEM_SIZE_ESTIMATE};

/// Maximum reasonable viewport size before treating it as infinite.
/// ~2000 items at 50px each.
const MAX_REASONABLE_VIEWPORT: f32 = 100_000.0;

/// Number of items shown in the infinite viewport fallback.
const INFINITE_VIEWPORT_ITEM_COUNT: f32 = 20.0;

/// Scroll offset and size of the visible region along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Viewport {
    pub offset: f32,
    pub size: f32,
}

impl Viewport {
    pub fn new(offset: f32, size: f32) -> Self {
        Self { offset, size }
    }

    #[inline]
    pub fn end(&self) -> f32 {
        self.offset + self.size
    }

    /// Whether the realized content reaches `reach` beyond the viewport edge
    /// toward `direction`, or the sequence of `count` items is exhausted there.
    pub fn covers(
        &self,
        direction: Direction,
        extent: &WindowExtent,
        count: usize,
        reach: f32,
    ) -> bool {
        if count == 0 {
            return true;
        }
        match direction {
            Direction::End => {
                extent.at_last_index(count)
                    || extent.end().is_some_and(|end| end >= self.end() + reach)
            }
            Direction::Start => {
                extent.at_first_index()
                    || extent
                        .start()
                        .is_some_and(|start| start <= self.offset - reach)
            }
        }
    }

    /// Whether `meta` overlaps the viewport grown by `margin` on both sides.
    pub fn retains(&self, meta: &Meta, margin: f32) -> bool {
        meta.end() >= self.offset - margin && meta.offset <= self.end() + margin
    }

    /// Estimated first visible index for an empty window.
    pub fn anchor(&self, average_size: f32, count: usize) -> Anchor {
        if count == 0 || !average_size.is_finite() || average_size <= 0.0 {
            return Anchor::with_offset(0, 0.0);
        }
        let estimate = (self.offset.max(0.0) / average_size).floor() as usize;
        let index = estimate.min(count - 1);
        Anchor::with_offset(index, index as f32 * average_size)
    }
}

/// Handles viewport size validation and provides the effective viewport size.
#[derive(Clone, Copy, Debug)]
pub struct ViewportHandler {
    effective_size: f32,
    is_infinite: bool,
}

impl ViewportHandler {
    /// Validates `viewport_size`.
    ///
    /// Infinite or absurdly large sizes fall back to room for a fixed number
    /// of average-sized items. Negative and NaN sizes collapse to zero.
    pub fn new(viewport_size: f32, average_item_size: f32, spacing: f32) -> Self {
        if viewport_size.is_nan() || viewport_size < 0.0 {
            return Self {
                effective_size: 0.0,
                is_infinite: false,
            };
        }
        let is_infinite = viewport_size.is_infinite() || viewport_size > MAX_REASONABLE_VIEWPORT;

        let effective_size = if is_infinite {
            let average = if average_item_size.is_finite() {
                average_item_size.max(DEFAULT_ITEM_SIZE_ESTIMATE)
            } else {
                DEFAULT_ITEM_SIZE_ESTIMATE
            };
            let estimated_size = (average + spacing) * INFINITE_VIEWPORT_ITEM_COUNT;
            log::warn!(
                "recycler: unbounded viewport ({}), using fallback size {}. \
                 Give the layout a constrained container.",
                viewport_size,
                estimated_size
            );
            estimated_size
        } else {
            viewport_size
        };

        Self {
            effective_size,
            is_infinite,
        }
    }

    #[inline]
    pub fn effective_size(&self) -> f32 {
        self.effective_size
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.is_infinite
    }

    /// Viewport at `offset` with the effective size.
    pub fn viewport(&self, offset: f32) -> Viewport {
        Viewport::new(offset, self.effective_size)
    }
}

#[cfg(test)]
#[path = "tests/viewport_tests.rs"]
mod tests;
