use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::warn;

use crate::embed::Embedding;
use crate::index::{EmbeddingIndex, Neighbor, ReferenceEntry};
use crate::{Error, Result};

/// Exact inner-product index over a contiguous block of vectors.
///
/// Brute-force: every query is scored against every entry. Reference sets
/// are a handful of images per product, so this stays fast.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    /// Row-major, `labels.len() * dimension` values
    vectors: Vec<f32>,
    labels: Vec<String>,
}

/// Write-once collector for reference entries.
///
/// Consumed by [`finish`](Self::finish); the resulting [`FlatIndex`] has no
/// way to add entries.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: Vec<ReferenceEntry>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, embedding: Embedding, label: impl Into<String>) {
        self.entries.push(ReferenceEntry::new(embedding, label));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate the collected entries and build the index.
    pub fn finish(self) -> Result<FlatIndex> {
        FlatIndex::build(self.entries)
    }
}

impl FlatIndex {
    /// Build an index from reference entries, keeping their order.
    ///
    /// Fails with [`Error::EmptyReferenceSet`] on empty input and
    /// [`Error::DimensionMismatch`] when an entry's length differs from the
    /// first entry's.
    pub fn build(entries: impl IntoIterator<Item = ReferenceEntry>) -> Result<Self> {
        let mut entries = entries.into_iter().peekable();

        let dimension = match entries.peek() {
            Some(first) => first.embedding.len(),
            None => return Err(Error::EmptyReferenceSet),
        };
        if dimension == 0 {
            return Err(Error::InvalidInput(
                "reference embeddings have zero length".to_string(),
            ));
        }

        let mut vectors = Vec::new();
        let mut labels = Vec::new();
        for (index, entry) in entries.enumerate() {
            if entry.embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    index,
                    expected: dimension,
                    found: entry.embedding.len(),
                });
            }
            vectors.extend_from_slice(&entry.embedding);
            labels.push(entry.label);
        }

        Ok(Self {
            dimension,
            vectors,
            labels,
        })
    }

    /// An index with no entries; every search comes back empty.
    #[must_use]
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub(crate) fn from_parts(dimension: usize, vectors: Vec<f32>, labels: Vec<String>) -> Self {
        debug_assert_eq!(vectors.len(), labels.len() * dimension);
        Self {
            dimension,
            vectors,
            labels,
        }
    }

    pub(crate) fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Stored embedding of entry `index`
    #[must_use]
    pub fn embedding(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dimension)
    }

    fn search_one(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut heap: BinaryHeap<Candidate> = self
            .rows()
            .enumerate()
            .map(|(index, row)| Candidate {
                index,
                score: inner_product(query, row),
            })
            .collect();

        std::iter::from_fn(|| heap.pop())
            .take(k)
            .map(|c| Neighbor {
                index: c.index,
                label: self.labels[c.index].clone(),
                score: c.score,
            })
            .collect()
    }
}

impl EmbeddingIndex for FlatIndex {
    fn search(&self, queries: &[Embedding], k: usize) -> Result<Vec<Vec<Neighbor>>> {
        if self.labels.is_empty() {
            warn!("search on an empty index, returning no neighbours");
            return Ok(vec![Vec::new(); queries.len()]);
        }

        queries
            .iter()
            .enumerate()
            .map(|(index, query)| {
                if query.len() != self.dimension {
                    return Err(Error::DimensionMismatch {
                        index,
                        expected: self.dimension,
                        found: query.len(),
                    });
                }
                Ok(self.search_one(query, k))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Heap entry; the greatest candidate is the best hit.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    score: f32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Inner product of two equal-length vectors.
///
/// Equals cosine similarity when both are unit-normalized.
fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn entry(embedding: Vec<f32>, label: &str) -> ReferenceEntry {
        ReferenceEntry::new(embedding, label)
    }

    fn sample_index() -> FlatIndex {
        FlatIndex::build(vec![
            entry(vec![0.0, 1.0, 0.0], "far"),
            entry(vec![1.0, 0.0, 0.0], "close"),
            entry(vec![0.6, 0.8, 0.0], "medium"),
        ])
        .unwrap()
    }

    #[test]
    fn test_inner_product_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((inner_product(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_inner_product_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((inner_product(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_empty_fails() {
        let result = FlatIndex::build(Vec::new());
        assert!(matches!(result, Err(Error::EmptyReferenceSet)));
    }

    #[test]
    fn test_build_dimension_mismatch_fails() {
        let result = FlatIndex::build(vec![
            entry(vec![1.0, 0.0], "a"),
            entry(vec![1.0, 0.0, 0.0], "b"),
        ]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_build_keeps_order() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 3);
        assert_eq!(index.labels(), ["far", "close", "medium"]);
        assert_eq!(index.embedding(2), Some(&[0.6, 0.8, 0.0][..]));
        assert_eq!(index.embedding(3), None);
    }

    #[test]
    fn test_builder_finish() {
        let mut builder = IndexBuilder::new();
        assert!(builder.is_empty());
        builder.push(vec![1.0, 0.0], "a");
        builder.push(vec![0.0, 1.0], "b");
        assert_eq!(builder.len(), 2);

        let index = builder.finish().unwrap();
        assert_eq!(index.labels(), ["a", "b"]);
    }

    #[test]
    fn test_builder_finish_empty_fails() {
        assert!(matches!(
            IndexBuilder::new().finish(),
            Err(Error::EmptyReferenceSet)
        ));
    }

    #[test]
    fn test_search_returns_sorted() {
        let index = sample_index();
        let results = index.search(&[vec![1.0, 0.0, 0.0]], 3).unwrap();

        assert_eq!(results.len(), 1);
        let labels: Vec<&str> = results[0].iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["close", "medium", "far"]);
        assert!((results[0][0].score - 1.0).abs() < 1e-6);
        assert!((results[0][1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_k() {
        let index = sample_index();
        let results = index.search(&[vec![1.0, 0.0, 0.0]], 1).unwrap();
        assert_eq!(results[0].len(), 1);
        assert_eq!(results[0][0].index, 1);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = sample_index();
        let results = index.search(&[vec![1.0, 0.0, 0.0]], 100).unwrap();
        assert_eq!(results[0].len(), 3);
    }

    #[test]
    fn test_search_ties_prefer_lowest_index() {
        let index = FlatIndex::build(vec![
            entry(vec![0.0, 1.0], "other"),
            entry(vec![1.0, 0.0], "first"),
            entry(vec![1.0, 0.0], "second"),
            entry(vec![1.0, 0.0], "third"),
        ])
        .unwrap();

        let results = index.search(&[vec![1.0, 0.0]], 3).unwrap();
        let positions: Vec<usize> = results[0].iter().map(|n| n.index).collect();
        assert_eq!(positions, [1, 2, 3]);
    }

    #[test]
    fn test_search_multiple_queries_aligned() {
        let index = sample_index();
        let queries = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let results = index.search(&queries, 1).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0][0].label, "far");
        assert_eq!(results[1][0].label, "close");
    }

    #[test]
    fn test_search_query_dimension_mismatch() {
        let index = sample_index();
        let result = index.search(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]], 1);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_search() {
        let index = FlatIndex::empty(3);
        assert!(index.is_empty());

        let results = index.search(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_shared_across_threads() {
        let index = Arc::new(sample_index());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || index.search(&[vec![1.0, 0.0, 0.0]], 1).unwrap())
            })
            .collect();

        for handle in handles {
            let results = handle.join().unwrap();
            assert_eq!(results[0][0].label, "close");
        }
    }
}
