//! Reference embedding index
//!
//! Holds one embedding per reference image together with its class label
//! and answers exact nearest-neighbour queries by inner product.
//!
//! # Lifecycle
//!
//! The index is written once, offline, through an [`IndexBuilder`], saved to
//! an artifact directory, and then loaded read-only for detection runs:
//!
//! ```ignore
//! use shelfscan_lib::index::{EmbeddingIndex, FlatIndex, IndexBuilder};
//!
//! // Offline
//! let mut builder = IndexBuilder::new();
//! builder.push(embedding, "cola_red");
//! builder.finish()?.save("embeddings")?;
//!
//! // Online
//! let index = FlatIndex::load("embeddings")?;
//! let neighbours = index.search(&[query], 1)?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embed::Embedding;
use crate::Result;

/// One reference image: its embedding and the class it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub embedding: Embedding,
    pub label: String,
}

impl ReferenceEntry {
    pub fn new(embedding: Embedding, label: impl Into<String>) -> Self {
        Self {
            embedding,
            label: label.into(),
        }
    }
}

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Position of the entry in the index
    pub index: usize,
    /// Class label of the entry
    pub label: String,
    /// Inner product with the query; cosine similarity for unit vectors
    pub score: f32,
}

/// Trait for read-only nearest-neighbour indexes
pub trait EmbeddingIndex: Send + Sync {
    /// Find the `k` best entries for each query.
    ///
    /// Results are sorted by score, highest first, with ties going to the
    /// lowest entry index. An empty index yields an empty list per query.
    fn search(&self, queries: &[Embedding], k: usize) -> Result<Vec<Vec<Neighbor>>>;

    /// Number of reference entries
    fn len(&self) -> usize;

    /// Check if the index holds no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of every stored vector
    fn dimension(&self) -> usize;

    /// Labels, parallel to entry positions
    fn labels(&self) -> &[String];
}

impl<T: EmbeddingIndex + ?Sized> EmbeddingIndex for Arc<T> {
    fn search(&self, queries: &[Embedding], k: usize) -> Result<Vec<Vec<Neighbor>>> {
        (**self).search(queries, k)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn labels(&self) -> &[String] {
        (**self).labels()
    }
}

mod flat;
mod persist;

pub use flat::*;
pub use persist::{LABELS_FILE, VECTORS_FILE};
