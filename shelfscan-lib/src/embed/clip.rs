use std::io::Cursor;

use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use image::{ImageFormat, RgbImage};

use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// CLIP image embedder using Qdrant/clip-ViT-B-32-vision.
///
/// Uses fastembed for ONNX-based inference. This model produces
/// 512-dimensional normalized embeddings.
pub struct ClipEmbedder {
    model: ImageEmbedding,
    batch_size: Option<usize>,
}

impl ClipEmbedder {
    /// Create a new CLIP embedder.
    ///
    /// Downloads the model on first use (~350MB).
    pub fn new() -> Result<Self> {
        let opts = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_show_download_progress(true);

        ImageEmbedding::try_new(opts)
            .map(|model| Self {
                model,
                batch_size: None,
            })
            .map_err(|e| Error::Embedding(e.to_string()))
    }

    /// Limit how many crops go through the model at once.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }
}

fn encode_png(crop: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    crop.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

impl Embedder for ClipEmbedder {
    fn model_name(&self) -> &str {
        "Qdrant/clip-ViT-B-32-vision"
    }

    fn dimension(&self) -> usize {
        512
    }

    fn embed(&mut self, crop: &RgbImage) -> Result<Embedding> {
        self.embed_batch(std::slice::from_ref(crop))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }

    fn embed_batch(&mut self, crops: &[RgbImage]) -> Result<Vec<Embedding>> {
        if crops.is_empty() {
            return Ok(Vec::new());
        }

        let encoded = crops.iter().map(encode_png).collect::<Result<Vec<_>>>()?;
        let images: Vec<&[u8]> = encoded.iter().map(Vec::as_slice).collect();

        let embeddings = self
            .model
            .embed_bytes(&images, self.batch_size)
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if embeddings.len() != crops.len() {
            return Err(Error::Embedding(format!(
                "model returned {} embeddings for {} crops",
                embeddings.len(),
                crops.len()
            )));
        }
        Ok(embeddings)
    }
}
