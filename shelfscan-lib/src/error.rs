//! Error types for ShelfScan

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ShelfScan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ShelfScan operations
#[derive(Error, Debug)]
pub enum Error {
    /// Index build attempted with zero reference embeddings
    #[error("reference set is empty: no embeddings to index")]
    EmptyReferenceSet,

    /// Embeddings of inconsistent length
    #[error("dimension mismatch at entry {index}: expected {expected}, found {found}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// A crop produced a zero-norm (or non-finite) embedding
    #[error("degenerate embedding for crop {crop_index}: cannot normalize")]
    DegenerateEmbedding { crop_index: usize },

    /// A reference image produced a zero-norm (or non-finite) embedding
    #[error("degenerate embedding for reference {}: cannot normalize", .0.display())]
    DegenerateReference(PathBuf),

    /// Index or label artifact absent from disk
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Requested class is not one of the configured classes
    #[error("unknown class '{0}'")]
    InvalidClass(String),

    /// Failed to load or run the embedding model
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Failed to segment an image
    #[error("segmentation error: {0}")]
    Segmentation(String),

    /// Failed to render the annotated image
    #[error("render error: {0}")]
    Render(String),

    /// Invalid input provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
