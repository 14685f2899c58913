//! Image crop embedding
//!
//! Turns a crop into a fixed-length vector so crops can be compared with
//! reference images by cosine similarity.
//!
//! # Usage
//!
//! ```ignore
//! use shelfscan_lib::embed::{ClipEmbedder, Embedder};
//!
//! let mut embedder = ClipEmbedder::new()?;
//! let embedding = embedder.embed(&crop)?;
//! assert_eq!(embedding.len(), embedder.dimension());
//! ```

use image::RgbImage;

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for image embedding models
///
/// Implementations should return unit-norm vectors, but callers re-normalize
/// with [`l2_normalize`] before comparing.
pub trait Embedder: Send + Sync {
    /// Embed a single image crop
    fn embed(&mut self, crop: &RgbImage) -> Result<Embedding>;

    /// Embed several crops, returning one embedding per crop in input order
    ///
    /// The default runs [`embed`](Self::embed) in a loop; backends that batch
    /// natively should override it.
    fn embed_batch(&mut self, crops: &[RgbImage]) -> Result<Vec<Embedding>> {
        crops.iter().map(|crop| self.embed(crop)).collect()
    }

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// Scale a vector to unit L2 norm.
///
/// Returns `None` when the norm is zero or not finite.
#[must_use]
pub fn l2_normalize(mut embedding: Embedding) -> Option<Embedding> {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }

    for x in &mut embedding {
        *x /= norm;
    }
    Some(embedding)
}

mod clip;
pub use clip::*;
