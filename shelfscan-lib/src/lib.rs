//! ShelfScan - product counting and gap detection on shelf photos
//!
//! # Architecture
//!
//! ```text
//! Reference images -> Embedder -> IndexBuilder -> FlatIndex (saved once)
//!                                                    |
//! Shelf photo -> Segmenter -> crops -> Classifier <--+
//!                   |                     |
//!                 boxes ----------> matched boxes -> GapDetector
//!                                         |               |
//!                                         +--> Renderer <-+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shelfscan_lib::{
//!     classify::Classifier, config::DetectorConfig, embed::ClipEmbedder,
//!     pipeline::Pipeline, reference::ReferenceSet, render::OverlayRenderer,
//!     segment::ContourSegmenter,
//! };
//!
//! // Offline: build the reference index
//! let mut embedder = ClipEmbedder::new()?;
//! ReferenceSet::scan("reference_images")?
//!     .build_index(&mut embedder)?
//!     .save("embeddings")?;
//!
//! // Online: count a product on a shelf photo
//! let classifier = Classifier::from_artifacts(embedder, "embeddings")?;
//! let mut pipeline = Pipeline::new(ContourSegmenter::default(), classifier, OverlayRenderer::new());
//! let report = pipeline.run(&shelf, "cola_red", &DetectorConfig::default())?;
//! ```

pub mod classify;
pub mod config;
pub mod embed;
pub mod error;
pub mod gap;
pub mod index;
pub mod pipeline;
pub mod reference;
pub mod render;
pub mod segment;

pub use error::{Error, Result};
