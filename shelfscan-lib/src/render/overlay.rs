use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::gap::Gap;
use crate::render::Renderer;
use crate::segment::BoundingBox;
use crate::{Error, Result};

const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const GAP_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const HEADER_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BORDER_THICKNESS: u32 = 2;
const HEADER_HEIGHT: u32 = 40;
const HEADER_FONT_SIZE: f32 = 24.0;
const GAP_FONT_SIZE: f32 = 22.0;

/// Draws matched products in green, gaps in red and a summary bar on top.
///
/// Text needs a font; without one only boxes and the bar are drawn.
#[derive(Default)]
pub struct OverlayRenderer {
    font: Option<FontVec>,
}

impl OverlayRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a TTF/OTF font from disk for labels.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| Error::Render(format!("{}: {e}", path.display())))?;
        Ok(self.with_font(font))
    }

    pub fn with_font_bytes(self, bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| Error::Render(e.to_string()))?;
        Ok(self.with_font(font))
    }

    fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    #[must_use]
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_text(&self, image: &mut RgbImage, x: i32, y: i32, size: f32, color: Rgb<u8>, text: &str) {
        if let Some(font) = &self.font {
            draw_text_mut(image, color, x, y, PxScale::from(size), font, text);
        }
    }
}

/// Outline `[x1, y1, x2)` x `[y1, y2)` with a border growing inwards.
fn draw_border(image: &mut RgbImage, x1: u32, y1: u32, x2: u32, y2: u32, color: Rgb<u8>) {
    let x2 = x2.min(image.width());
    let y2 = y2.min(image.height());

    for t in 0..BORDER_THICKNESS {
        let (left, top) = (x1 + t, y1 + t);
        let (right, bottom) = (x2.saturating_sub(t), y2.saturating_sub(t));
        if left >= right || top >= bottom {
            break;
        }
        let rect = Rect::at(left as i32, top as i32).of_size(right - left, bottom - top);
        draw_hollow_rect_mut(image, rect, color);
    }
}

impl Renderer for OverlayRenderer {
    fn render(
        &self,
        image: &RgbImage,
        matched: &[BoundingBox],
        gaps: &[Gap],
        count: usize,
        class_name: &str,
    ) -> Result<RgbImage> {
        let mut output = image.clone();
        if output.width() == 0 || output.height() == 0 {
            return Ok(output);
        }

        for bbox in matched {
            draw_border(&mut output, bbox.x1, bbox.y1, bbox.x2, bbox.y2, MATCH_COLOR);
        }

        for gap in gaps {
            draw_border(&mut output, gap.x1, gap.y1, gap.x2, gap.y2, GAP_COLOR);
            self.draw_text(
                &mut output,
                gap.x1 as i32 + 5,
                gap.y1 as i32 + 5,
                GAP_FONT_SIZE,
                GAP_COLOR,
                "GAP",
            );
        }

        let bar = Rect::at(0, 0).of_size(output.width(), HEADER_HEIGHT.min(output.height()));
        draw_filled_rect_mut(&mut output, bar, HEADER_COLOR);

        let summary = format!("Class: {class_name} | Count: {count} | Gaps: {}", gaps.len());
        self.draw_text(&mut output, 10, 8, HEADER_FONT_SIZE, TEXT_COLOR, &summary);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: Rgb<u8> = Rgb([120, 120, 120]);

    fn canvas() -> RgbImage {
        RgbImage::from_pixel(120, 100, BACKGROUND)
    }

    #[test]
    fn test_input_untouched() {
        let image = canvas();
        let bbox = BoundingBox::new(10, 50, 50, 90).unwrap();

        let output = OverlayRenderer::new()
            .render(&image, &[bbox], &[], 1, "foo")
            .unwrap();

        assert_eq!(image, canvas());
        assert_eq!(output.dimensions(), image.dimensions());
    }

    #[test]
    fn test_matched_box_border() {
        let bbox = BoundingBox::new(10, 50, 50, 90).unwrap();
        let output = OverlayRenderer::new()
            .render(&canvas(), &[bbox], &[], 1, "foo")
            .unwrap();

        assert_eq!(*output.get_pixel(10, 70), MATCH_COLOR);
        assert_eq!(*output.get_pixel(11, 70), MATCH_COLOR);
        assert_eq!(*output.get_pixel(12, 70), BACKGROUND);
        assert_eq!(*output.get_pixel(49, 70), MATCH_COLOR);
        assert_eq!(*output.get_pixel(30, 89), MATCH_COLOR);
        assert_eq!(*output.get_pixel(30, 70), BACKGROUND);
    }

    #[test]
    fn test_gap_border() {
        let gap = Gap {
            x1: 50,
            y1: 50,
            x2: 80,
            y2: 90,
        };
        let output = OverlayRenderer::new()
            .render(&canvas(), &[], &[gap], 0, "foo")
            .unwrap();

        assert_eq!(*output.get_pixel(50, 60), GAP_COLOR);
        assert_eq!(*output.get_pixel(79, 60), GAP_COLOR);
        assert_eq!(*output.get_pixel(65, 70), BACKGROUND);
    }

    #[test]
    fn test_header_bar() {
        let output = OverlayRenderer::new()
            .render(&canvas(), &[], &[], 0, "foo")
            .unwrap();

        assert_eq!(*output.get_pixel(0, 0), HEADER_COLOR);
        assert_eq!(*output.get_pixel(119, 39), HEADER_COLOR);
        assert_eq!(*output.get_pixel(60, 40), BACKGROUND);
    }

    #[test]
    fn test_box_at_image_edge() {
        let bbox = BoundingBox::new(100, 60, 120, 100).unwrap();
        let output = OverlayRenderer::new()
            .render(&canvas(), &[bbox], &[], 1, "foo")
            .unwrap();

        assert_eq!(*output.get_pixel(119, 80), MATCH_COLOR);
        assert_eq!(*output.get_pixel(110, 99), MATCH_COLOR);
    }

    #[test]
    fn test_invalid_font_rejected() {
        let result = OverlayRenderer::new().with_font_bytes(b"not a font".to_vec());
        assert!(matches!(result, Err(Error::Render(_))));
    }

    #[test]
    fn test_missing_font_file() {
        let result = OverlayRenderer::new().with_font_file("/nonexistent/font.ttf");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
