//! Missing-stock gap detection
//!
//! Treats the matched products as one left-to-right row and reports the
//! horizontal intervals between neighbours that are wide enough to hold a
//! missing item. "Wide enough" is measured in units of the average observed
//! product width, so the threshold follows the product's apparent size in
//! the photo rather than a fixed pixel count.
//!
//! Only interior gaps are reported: nothing before the first product or
//! after the last one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_GAP_THRESHOLD_FACTOR;
use crate::segment::BoundingBox;

/// Empty shelf interval between two neighbouring products.
///
/// Spans horizontally from the left neighbour's right edge to the right
/// neighbour's left edge, and vertically over both neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gap {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Gap {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapDetector {
    pub threshold_factor: f64,
}

impl Default for GapDetector {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_THRESHOLD_FACTOR)
    }
}

impl GapDetector {
    #[must_use]
    pub fn new(threshold_factor: f64) -> Self {
        Self { threshold_factor }
    }

    /// Minimum gap width for `boxes`: average box width times the factor.
    #[must_use]
    pub fn min_gap_width(&self, boxes: &[BoundingBox]) -> f64 {
        if boxes.is_empty() {
            return 0.0;
        }
        let total: f64 = boxes.iter().map(|b| f64::from(b.width())).sum();
        total / boxes.len() as f64 * self.threshold_factor
    }

    /// Find gaps between matched boxes, left to right.
    ///
    /// The input order does not matter. Fewer than two boxes never produce
    /// a gap. A gap must be strictly wider than [`min_gap_width`](Self::min_gap_width).
    #[must_use]
    pub fn detect(&self, boxes: &[BoundingBox]) -> Vec<Gap> {
        if boxes.len() < 2 {
            return Vec::new();
        }

        let mut sorted = boxes.to_vec();
        sorted.sort_by_key(|b| b.x1); // stable

        let min_gap_width = self.min_gap_width(&sorted);

        let gaps: Vec<Gap> = sorted
            .windows(2)
            .filter_map(|pair| {
                let (a, b) = (&pair[0], &pair[1]);
                let gap_size = i64::from(b.x1) - i64::from(a.x2);
                ((gap_size as f64) > min_gap_width).then(|| Gap {
                    x1: a.x2,
                    y1: a.y1.min(b.y1),
                    x2: b.x1,
                    y2: a.y2.max(b.y2),
                })
            })
            .collect();

        debug!(
            "{} gaps among {} boxes (min width {min_gap_width:.1})",
            gaps.len(),
            boxes.len()
        );
        gaps
    }
}
