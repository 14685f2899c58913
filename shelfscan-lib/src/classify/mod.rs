//! Per-crop product classification
//!
//! Combines an embedder and a reference index: each crop is embedded, its
//! nearest reference is looked up, and the crop counts as the target product
//! iff the similarity reaches the threshold and the neighbour carries the
//! target label.
//!
//! # Usage
//!
//! ```ignore
//! use shelfscan_lib::classify::Classifier;
//!
//! let mut classifier = Classifier::from_artifacts(embedder, "embeddings")?;
//! let decisions = classifier.classify(&crops, "cola_red", 0.93)?;
//! let count = decisions.iter().filter(|d| d.matched).count();
//! ```

use std::path::Path;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::embed::{l2_normalize, Embedder, Embedding};
use crate::index::{EmbeddingIndex, FlatIndex, Neighbor};
use crate::{Error, Result};

/// Outcome for one crop, at the same position as the crop in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub crop_index: usize,
    pub matched: bool,
    /// Similarity to the nearest reference; `None` when the crop was skipped
    /// or the index is empty
    pub similarity: Option<f32>,
    /// Label of the nearest reference
    pub label: Option<String>,
}

impl MatchDecision {
    fn unmatched(crop_index: usize) -> Self {
        Self {
            crop_index,
            matched: false,
            similarity: None,
            label: None,
        }
    }
}

/// Threshold decision rule: inclusive on similarity, exact on label.
#[must_use]
pub fn accepts(neighbor: &Neighbor, target_class: &str, threshold: f32) -> bool {
    neighbor.score >= threshold && neighbor.label == target_class
}

/// Nearest-neighbour classifier over a reference index.
pub struct Classifier<E: Embedder, I: EmbeddingIndex = FlatIndex> {
    embedder: E,
    index: I,
}

impl<E: Embedder> Classifier<E, FlatIndex> {
    /// Load the index saved in `dir` and wrap it.
    ///
    /// Fails with [`Error::MissingArtifact`] if the index or labels are absent.
    pub fn from_artifacts(embedder: E, dir: impl AsRef<Path>) -> Result<Self> {
        let index = FlatIndex::load(dir)?;
        info!("classifier loaded with {} reference items", index.len());
        Ok(Self::new(embedder, index))
    }
}

impl<E: Embedder, I: EmbeddingIndex> Classifier<E, I> {
    #[must_use]
    pub fn new(embedder: E, index: I) -> Self {
        Self { embedder, index }
    }

    /// Decide for every crop whether it shows `target_class`.
    ///
    /// Always returns one decision per crop, in input order. A crop whose
    /// embedding cannot be normalized is skipped with a warning and reported
    /// as unmatched. Embedding backend failures and dimension mismatches
    /// abort the whole batch.
    pub fn classify(
        &mut self,
        crops: &[RgbImage],
        target_class: &str,
        similarity_threshold: f32,
    ) -> Result<Vec<MatchDecision>> {
        let mut decisions: Vec<MatchDecision> =
            (0..crops.len()).map(MatchDecision::unmatched).collect();

        if crops.is_empty() {
            return Ok(decisions);
        }
        if self.index.is_empty() {
            warn!("reference index is empty, no crop can match");
            return Ok(decisions);
        }

        let raw = self.embedder.embed_batch(crops)?;
        if raw.len() != crops.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} embeddings for {} crops",
                self.embedder.model_name(),
                raw.len(),
                crops.len()
            )));
        }

        let mut positions = Vec::with_capacity(raw.len());
        let mut queries: Vec<Embedding> = Vec::with_capacity(raw.len());
        for (crop_index, embedding) in raw.into_iter().enumerate() {
            match l2_normalize(embedding) {
                Some(query) => {
                    positions.push(crop_index);
                    queries.push(query);
                }
                None => warn!("{}", Error::DegenerateEmbedding { crop_index }),
            }
        }

        let results = self.index.search(&queries, 1)?;
        for (crop_index, neighbors) in positions.into_iter().zip(results) {
            let Some(nearest) = neighbors.into_iter().next() else {
                continue;
            };

            let decision = &mut decisions[crop_index];
            decision.matched = accepts(&nearest, target_class, similarity_threshold);
            decision.similarity = Some(nearest.score);
            debug!(
                "crop {crop_index}: nearest '{}' at {:.4} -> {}",
                nearest.label,
                nearest.score,
                if decision.matched { "match" } else { "reject" }
            );
            decision.label = Some(nearest.label);
        }

        let matches = decisions.iter().filter(|d| d.matched).count();
        info!("found {matches} matches for '{target_class}'");
        Ok(decisions)
    }

    /// Returns a reference to the embedder.
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Returns a reference to the index.
    #[must_use]
    pub fn index(&self) -> &I {
        &self.index
    }
}
