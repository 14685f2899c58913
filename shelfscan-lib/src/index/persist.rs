//! On-disk layout of a [`FlatIndex`]
//!
//! An artifact directory holds two files:
//! - `vectors.bin`: `SSIX` magic, then version, dimension and entry count as
//!   little-endian `u32`, then every vector as little-endian `f32`
//! - `labels.json`: the dimension and the label of every entry, in order
//!
//! Floats are stored as raw bits, so a reloaded index answers every query
//! exactly as the saved one did.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::index::{EmbeddingIndex, FlatIndex};
use crate::{Error, Result};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const LABELS_FILE: &str = "labels.json";

const MAGIC: &[u8; 4] = b"SSIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct LabelFile {
    dimension: usize,
    labels: Vec<String>,
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidInput(format!("{what} {value} does not fit in u32")))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn require(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingArtifact(path))
    }
}

impl FlatIndex {
    /// Write the index into `dir`, creating it if needed.
    ///
    /// Must not run while another process reads from the same directory.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut writer = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&to_u32(self.dimension(), "dimension")?.to_le_bytes())?;
        writer.write_all(&to_u32(self.len(), "entry count")?.to_le_bytes())?;
        for value in self.vectors() {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;

        let labels = LabelFile {
            dimension: self.dimension(),
            labels: self.labels().to_vec(),
        };
        let writer = BufWriter::new(File::create(dir.join(LABELS_FILE))?);
        serde_json::to_writer_pretty(writer, &labels)?;

        info!(
            "saved index with {} entries (dimension {}) to {}",
            self.len(),
            self.dimension(),
            dir.display()
        );
        Ok(())
    }

    /// Load an index previously written by [`save`](Self::save).
    ///
    /// Fails with [`Error::MissingArtifact`] when either file is absent.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let vectors_path = require(dir.join(VECTORS_FILE))?;
        let labels_path = require(dir.join(LABELS_FILE))?;

        let bytes = fs::read(&vectors_path)?;
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(Error::InvalidInput(format!(
                "{} is not an index file",
                vectors_path.display()
            )));
        }
        let version = read_u32(&bytes, 4);
        if version != FORMAT_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported index format version {version}"
            )));
        }
        let dimension = read_u32(&bytes, 8) as usize;
        let count = read_u32(&bytes, 12) as usize;

        if dimension == 0 && count > 0 {
            return Err(Error::InvalidInput(
                "index declares zero-length vectors".to_string(),
            ));
        }
        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN));
        if expected_len != Some(bytes.len()) {
            return Err(Error::InvalidInput(format!(
                "{} is truncated or corrupt",
                vectors_path.display()
            )));
        }

        let vectors: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();

        let labels: LabelFile = serde_json::from_slice(&fs::read(&labels_path)?)?;
        if labels.labels.len() != count {
            return Err(Error::InvalidInput(format!(
                "{} has {} labels for {count} vectors",
                labels_path.display(),
                labels.labels.len()
            )));
        }
        if labels.dimension != dimension {
            return Err(Error::DimensionMismatch {
                index: 0,
                expected: dimension,
                found: labels.dimension,
            });
        }

        info!(
            "loaded index with {count} entries (dimension {dimension}) from {}",
            dir.display()
        );
        Ok(Self::from_parts(dimension, vectors, labels.labels))
    }
}
