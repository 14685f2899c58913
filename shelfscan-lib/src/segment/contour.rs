use std::collections::BTreeMap;

use image::{GrayImage, Luma, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::{debug, warn};

use crate::segment::{BoundingBox, Segment, Segmenter};
use crate::Result;

/// Edge-based segmenter - no model required
///
/// Finds object outlines with Canny edge detection, groups edge pixels into
/// 8-connected regions and boxes each region tightly. Overlapping boxes are
/// merged so a product whose outline breaks into pieces still comes out as
/// one segment; boxes that merely sit close together stay apart.
///
/// Parameters to consider:
/// - sigma: blur strength before edge detection
/// - low/high_threshold: Canny hysteresis thresholds
/// - min_area: minimum edge pixels for a region to count
/// - min_side: minimum box width and height
#[derive(Debug, Clone)]
pub struct ContourSegmenter {
    pub sigma: f32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub min_area: u32,
    pub min_side: u32,
}

impl Default for ContourSegmenter {
    fn default() -> Self {
        Self {
            sigma: 1.5,
            low_threshold: 50.0,
            high_threshold: 100.0,
            min_area: 10,
            min_side: 8,
        }
    }
}

/// Pixel extent of one labelled region, inclusive.
#[derive(Debug, Clone, Copy)]
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixel_count: u32,
}

impl ContourSegmenter {
    fn edges(&self, image: &RgbImage) -> GrayImage {
        let gray = image::imageops::grayscale(image);
        let smoothed = if self.sigma > 0.0 {
            gaussian_blur_f32(&gray, self.sigma)
        } else {
            gray
        };
        canny(&smoothed, self.low_threshold, self.high_threshold)
    }

    fn regions(&self, edges: &GrayImage) -> Vec<Region> {
        let labeled = connected_components(edges, Connectivity::Eight, Luma([0u8]));

        let mut regions: BTreeMap<u32, Region> = BTreeMap::new();
        for (x, y, label) in labeled.enumerate_pixels() {
            let label = label[0];
            if label == 0 {
                continue; // background
            }

            regions
                .entry(label)
                .and_modify(|r| {
                    r.min_x = r.min_x.min(x);
                    r.min_y = r.min_y.min(y);
                    r.max_x = r.max_x.max(x);
                    r.max_y = r.max_y.max(y);
                    r.pixel_count += 1;
                })
                .or_insert(Region {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    pixel_count: 1,
                });
        }

        regions
            .into_values()
            .filter(|r| r.pixel_count >= self.min_area)
            .collect()
    }
}

impl Region {
    /// Exclusive-end box around the region's pixels.
    fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::new(self.min_x, self.min_y, self.max_x + 1, self.max_y + 1).ok()
    }
}

fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.x1 < b.x2 && b.x1 < a.x2 && a.y1 < b.y2 && b.y1 < a.y2
}

fn union(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        x1: a.x1.min(b.x1),
        y1: a.y1.min(b.y1),
        x2: a.x2.max(b.x2),
        y2: a.y2.max(b.y2),
    }
}

/// Merge overlapping boxes until no two overlap.
fn merge_overlapping(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    loop {
        let mut merged_any = false;
        let mut merged: Vec<BoundingBox> = Vec::with_capacity(boxes.len());

        for bbox in boxes {
            match merged.iter_mut().find(|m| overlaps(m, &bbox)) {
                Some(existing) => {
                    *existing = union(existing, &bbox);
                    merged_any = true;
                }
                None => merged.push(bbox),
            }
        }

        if !merged_any {
            return merged;
        }
        boxes = merged;
    }
}

impl Segmenter for ContourSegmenter {
    fn name(&self) -> &str {
        "contour"
    }

    fn segment(&self, image: &RgbImage) -> Result<Vec<Segment>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            warn!("cannot segment an empty image");
            return Ok(Vec::new());
        }

        let edges = self.edges(image);
        let regions = self.regions(&edges);
        debug!("found {} edge regions", regions.len());

        let boxes: Vec<BoundingBox> = regions.iter().filter_map(Region::bbox).collect();

        let mut boxes: Vec<BoundingBox> = merge_overlapping(boxes)
            .into_iter()
            .filter(|b| b.width() >= self.min_side && b.height() >= self.min_side)
            .collect();

        // largest first, then top-left to bottom-right
        boxes.sort_by(|a, b| {
            b.area()
                .cmp(&a.area())
                .then(a.y1.cmp(&b.y1))
                .then(a.x1.cmp(&b.x1))
        });

        if boxes.is_empty() {
            warn!("no objects segmented");
        }

        Ok(boxes
            .into_iter()
            .map(|bbox| Segment {
                crop: bbox.crop(image),
                bbox,
            })
            .collect())
    }
}
