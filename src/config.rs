// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Skipped reference regions (cigar N) of at least `min_len` bases are replaced
/// by `placeholder_len` wildcard bases before read windows are compared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, CopyGetters)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct SkippedReferenceRegions {
    min_len: u32,
    placeholder_len: usize,
}

impl SkippedReferenceRegions {
    pub fn new(min_len: u32, placeholder_len: usize) -> Self {
        SkippedReferenceRegions {
            min_len,
            placeholder_len,
        }
    }
}

impl Default for SkippedReferenceRegions {
    fn default() -> Self {
        SkippedReferenceRegions {
            min_len: 32,
            placeholder_len: 3,
        }
    }
}

/// Penalties used to derive the quality score of a single read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, CopyGetters)]
#[getset(get_copy = "pub")]
#[serde(default)]
#[builder(default)]
pub struct QualityConfig {
    base_quality_fixed_penalty: f64,
    read_edge_factor: f64,
    read_edge_fixed_penalty: f64,
    map_quality_fixed_penalty: f64,
    map_quality_improper_pair_penalty: f64,
    map_quality_read_events_penalty: f64,
    jitter_penalty: f64,
    jitter_min_repeat_count: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            base_quality_fixed_penalty: 12.0,
            read_edge_factor: 3.0,
            read_edge_fixed_penalty: 0.0,
            map_quality_fixed_penalty: 15.0,
            map_quality_improper_pair_penalty: 15.0,
            map_quality_read_events_penalty: 8.0,
            jitter_penalty: 0.25,
            jitter_min_repeat_count: 3,
        }
    }
}

/// Configuration of the read evidence engine.
///
/// Validation of the values (e.g. a positive flank size) is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters, CopyGetters)]
#[serde(default)]
#[builder(default)]
pub struct EvidenceConfig {
    #[getset(get_copy = "pub")]
    flank_size: usize,
    #[getset(get_copy = "pub")]
    skipped_reference_regions: SkippedReferenceRegions,
    #[getset(get_copy = "pub")]
    max_coverage: u32,
    #[getset(get_copy = "pub")]
    min_number_of_events: u32,
    #[getset(get_copy = "pub")]
    min_map_quality: u8,
    #[getset(get_copy = "pub")]
    realign: bool,
    #[getset(get = "pub")]
    quality: QualityConfig,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        EvidenceConfig {
            flank_size: 10,
            skipped_reference_regions: SkippedReferenceRegions::default(),
            max_coverage: 1000,
            min_number_of_events: 1,
            min_map_quality: 10,
            realign: true,
            quality: QualityConfig::default(),
        }
    }
}

impl EvidenceConfig {
    /// Load configuration from a YAML file. Missing keys fall back to their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "unable to read configuration from {}",
                path.as_ref().display()
            )
        })?;
        let config: EvidenceConfig = serde_yaml::from_str(&content).with_context(|| {
            format!("invalid configuration in {}", path.as_ref().display())
        })?;
        debug!("loaded configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "flank_size: 5\nrealign: false\nquality:\n  jitter_penalty: 0.5\nskipped_reference_regions:\n  min_len: 100"
        )
        .unwrap();

        let config = EvidenceConfig::from_path(file.path()).unwrap();
        assert_eq!(config.flank_size(), 5);
        assert!(!config.realign());
        assert_eq!(config.max_coverage(), 1000);
        assert_relative_eq!(config.quality().jitter_penalty(), 0.5);
        assert_relative_eq!(config.quality().map_quality_fixed_penalty(), 15.0);
        assert_eq!(config.skipped_reference_regions().min_len(), 100);
        assert_eq!(config.skipped_reference_regions().placeholder_len(), 3);
    }

    #[test]
    fn test_builder() {
        let config = EvidenceConfigBuilder::default()
            .flank_size(7)
            .min_map_quality(20)
            .build()
            .unwrap();
        assert_eq!(config.flank_size(), 7);
        assert_eq!(config.min_map_quality(), 20);
        assert_eq!(config.min_number_of_events(), 1);
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flank_size: [1, 2]").unwrap();
        assert!(EvidenceConfig::from_path(file.path()).is_err());
    }
}
