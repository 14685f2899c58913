//! Shelf image segmentation
//!
//! A [`Segmenter`] splits a shelf photo into candidate object regions. Each
//! [`Segment`] pairs a bounding box with the crop cut out by it, so boxes and
//! crops can never drift out of alignment.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Create a box, rejecting empty or inverted extents.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(Error::InvalidInput(format!(
                "degenerate bounding box [{x1}, {y1}, {x2}, {y2}]"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Cut this box out of `image`. The box must lie within the image.
    #[must_use]
    pub fn crop(&self, image: &RgbImage) -> RgbImage {
        image::imageops::crop_imm(image, self.x1, self.y1, self.width(), self.height()).to_image()
    }
}

/// One segmented object: where it is and what it looks like.
#[derive(Debug, Clone)]
pub struct Segment {
    pub bbox: BoundingBox,
    pub crop: RgbImage,
}

/// Trait for segmentation backends
pub trait Segmenter: Send + Sync {
    /// Split an image into object segments.
    ///
    /// Boxes must lie within the image bounds. An image with no objects
    /// yields an empty vector, not an error.
    fn segment(&self, image: &RgbImage) -> Result<Vec<Segment>>;

    /// Returns the name of this segmentation strategy
    fn name(&self) -> &str;
}

mod contour;
pub use contour::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_degenerate() {
        assert!(BoundingBox::new(10, 0, 10, 5).is_err());
        assert!(BoundingBox::new(0, 8, 5, 3).is_err());
        assert!(BoundingBox::new(0, 0, 5, 3).is_ok());
    }

    #[test]
    fn test_dimensions() {
        let bbox = BoundingBox::new(10, 20, 50, 80).unwrap();
        assert_eq!(bbox.width(), 40);
        assert_eq!(bbox.height(), 60);
        assert_eq!(bbox.area(), 2400);
    }

    #[test]
    fn test_crop_extracts_region() {
        let image = RgbImage::from_fn(10, 10, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let bbox = BoundingBox::new(2, 3, 6, 5).unwrap();

        let crop = bbox.crop(&image);
        assert_eq!(crop.dimensions(), (4, 2));
        assert_eq!(crop.get_pixel(0, 0), &image::Rgb([2, 3, 0]));
        assert_eq!(crop.get_pixel(3, 1), &image::Rgb([5, 4, 0]));
    }
}
