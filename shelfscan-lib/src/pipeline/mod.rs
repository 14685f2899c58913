//! End-to-end detection run
//!
//! Wires the components together: segment the shelf photo, classify every
//! crop, look for gaps between the matched products, and draw the result.
//! The pipeline only routes data between components; thresholds and
//! geometry live in [`Classifier`] and [`GapDetector`].
//!
//! # Usage
//!
//! ```ignore
//! use shelfscan_lib::pipeline::Pipeline;
//!
//! let classifier = Classifier::from_artifacts(ClipEmbedder::new()?, "embeddings")?;
//! let mut pipeline = Pipeline::new(ContourSegmenter::default(), classifier, OverlayRenderer::new())
//!     .with_known_classes(list_classes("reference_images")?);
//!
//! let report = pipeline.run(&image, "cola_red", &DetectorConfig::default())?;
//! println!("Detected {} instances", report.count);
//! ```

use std::collections::BTreeSet;

use image::RgbImage;
use tracing::info;

use crate::classify::{Classifier, MatchDecision};
use crate::config::DetectorConfig;
use crate::embed::Embedder;
use crate::gap::{Gap, GapDetector};
use crate::index::{EmbeddingIndex, FlatIndex};
use crate::render::Renderer;
use crate::segment::{BoundingBox, Segment, Segmenter};
use crate::{Error, Result};

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct DetectionReport {
    pub class_name: String,
    /// Number of segments the segmenter returned
    pub segments: usize,
    /// One decision per segment, in segmentation order
    pub decisions: Vec<MatchDecision>,
    /// Matched boxes in segmentation order
    pub matched_boxes: Vec<BoundingBox>,
    /// Gaps, left to right
    pub gaps: Vec<Gap>,
    pub count: usize,
    pub annotated: RgbImage,
}

/// Detection pipeline over injected collaborators.
pub struct Pipeline<S: Segmenter, E: Embedder, R: Renderer, I: EmbeddingIndex = FlatIndex> {
    segmenter: S,
    classifier: Classifier<E, I>,
    renderer: R,
    known_classes: Option<BTreeSet<String>>,
}

impl<S: Segmenter, E: Embedder, R: Renderer, I: EmbeddingIndex> Pipeline<S, E, R, I> {
    #[must_use]
    pub fn new(segmenter: S, classifier: Classifier<E, I>, renderer: R) -> Self {
        Self {
            segmenter,
            classifier,
            renderer,
            known_classes: None,
        }
    }

    /// Restrict runs to these classes; anything else fails with
    /// [`Error::InvalidClass`]. Without this every class name is accepted.
    #[must_use]
    pub fn with_known_classes<C: Into<String>>(mut self, classes: impl IntoIterator<Item = C>) -> Self {
        self.known_classes = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    fn check_class(&self, target_class: &str) -> Result<()> {
        match &self.known_classes {
            Some(known) if !known.contains(target_class) => {
                Err(Error::InvalidClass(target_class.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Count `target_class` on the shelf in `image` and find its gaps.
    pub fn run(
        &mut self,
        image: &RgbImage,
        target_class: &str,
        config: &DetectorConfig,
    ) -> Result<DetectionReport> {
        config.validate()?;
        self.check_class(target_class)?;

        let segments = self.segmenter.segment(image)?;
        info!(
            "{} produced {} segments",
            self.segmenter.name(),
            segments.len()
        );

        let (boxes, crops): (Vec<BoundingBox>, Vec<RgbImage>) = segments
            .into_iter()
            .map(|Segment { bbox, crop }| (bbox, crop))
            .unzip();

        let decisions = self
            .classifier
            .classify(&crops, target_class, config.similarity_threshold)?;

        let matched_boxes: Vec<BoundingBox> = boxes
            .iter()
            .zip(&decisions)
            .filter(|(_, decision)| decision.matched)
            .map(|(bbox, _)| *bbox)
            .collect();
        let count = matched_boxes.len();

        let gaps = GapDetector::new(config.gap_threshold_factor).detect(&matched_boxes);

        let annotated = self
            .renderer
            .render(image, &matched_boxes, &gaps, count, target_class)?;

        info!(
            "detected {count} instances of '{target_class}', {} gaps",
            gaps.len()
        );

        Ok(DetectionReport {
            class_name: target_class.to_string(),
            segments: boxes.len(),
            decisions,
            matched_boxes,
            gaps,
            count,
            annotated,
        })
    }

    /// Returns a reference to the classifier.
    #[must_use]
    pub fn classifier(&self) -> &Classifier<E, I> {
        &self.classifier
    }
}
