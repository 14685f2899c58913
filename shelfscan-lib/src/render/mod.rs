//! Result visualization
//!
//! A [`Renderer`] draws the outcome of a run onto a copy of the shelf photo.

use image::RgbImage;

use crate::gap::Gap;
use crate::segment::BoundingBox;
use crate::Result;

/// Trait for drawing detection results
pub trait Renderer: Send + Sync {
    /// Produce an annotated copy of `image`. The input is left untouched.
    fn render(
        &self,
        image: &RgbImage,
        matched: &[BoundingBox],
        gaps: &[Gap],
        count: usize,
        class_name: &str,
    ) -> Result<RgbImage>;
}

mod overlay;
pub use overlay::*;
