//! Detection configuration
//!
//! Both knobs can be changed per run without rebuilding the index.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default cosine similarity a crop must reach to count as a match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.93;

/// Default multiplier applied to the average product width to size a gap.
pub const DEFAULT_GAP_THRESHOLD_FACTOR: f64 = 0.75;

/// Thresholds used by a single detection run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum cosine similarity (inclusive) for a match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Gaps must be strictly wider than `average width * factor`
    #[serde(default = "default_gap_threshold_factor")]
    pub gap_threshold_factor: f64,
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_gap_threshold_factor() -> f64 {
    DEFAULT_GAP_THRESHOLD_FACTOR
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            gap_threshold_factor: DEFAULT_GAP_THRESHOLD_FACTOR,
        }
    }
}

impl DetectorConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_gap_threshold_factor(mut self, factor: f64) -> Self {
        self.gap_threshold_factor = factor;
        self
    }

    /// Check that both values are usable.
    ///
    /// Cosine similarity lives in [-1, 1], so a threshold outside that range
    /// would accept or reject everything.
    pub fn validate(&self) -> Result<()> {
        let t = self.similarity_threshold;
        if !t.is_finite() || !(-1.0..=1.0).contains(&t) {
            return Err(Error::InvalidInput(format!(
                "similarity threshold must be within [-1, 1], got {t}"
            )));
        }

        let f = self.gap_threshold_factor;
        if !f.is_finite() || f <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "gap threshold factor must be positive, got {f}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.similarity_threshold, 0.93);
        assert_eq!(config.gap_threshold_factor, 0.75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DetectorConfig = serde_json::from_str(r#"{"similarity_threshold": 0.8}"#).unwrap();
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.gap_threshold_factor, DEFAULT_GAP_THRESHOLD_FACTOR);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = DetectorConfig::default().with_similarity_threshold(1.5);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));

        let config = DetectorConfig::default().with_gap_threshold_factor(0.0);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));

        let config = DetectorConfig::default().with_gap_threshold_factor(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"gap_threshold_factor": 1.25}}"#).unwrap();

        let config = DetectorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(config.gap_threshold_factor, 1.25);
    }

    #[test]
    fn test_from_json_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"similarity_threshold": -3.0}}"#).unwrap();

        assert!(DetectorConfig::from_json_file(file.path()).is_err());
    }
}
