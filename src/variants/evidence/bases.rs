// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::errors::Error;

lazy_static! {
    pub(crate) static ref EMPTY_RECALIBRATION: QualityRecalibrationMap =
        QualityRecalibrationMap::default();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecalibrationKey {
    ref_base: u8,
    alt_base: u8,
    trinucleotide: [u8; 3],
    quality: u8,
}

#[derive(Debug, Deserialize)]
struct RecalibrationRecord {
    #[serde(rename = "ref")]
    ref_base: String,
    #[serde(rename = "alt")]
    alt_base: String,
    #[serde(rename = "trinucleotideContext")]
    trinucleotide: String,
    #[serde(rename = "count")]
    _count: u64,
    #[serde(rename = "originalQual")]
    original_quality: u8,
    #[serde(rename = "recalibratedQual")]
    recalibrated_quality: f64,
}

/// Empirically recalibrated base qualities, keyed by reference base, read base,
/// trinucleotide context and reported quality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityRecalibrationMap {
    qualities: HashMap<RecalibrationKey, f64>,
}

impl QualityRecalibrationMap {
    /// Read a tab separated table with the columns
    /// `ref, alt, trinucleotideContext, count, originalQual, recalibratedQual`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .with_context(|| {
                format!(
                    "unable to read base quality recalibration from {}",
                    path.as_ref().display()
                )
            })?;

        let mut map = QualityRecalibrationMap::default();
        for record in reader.deserialize() {
            let record: RecalibrationRecord = record?;
            let single_base = |s: &str| -> Result<u8> {
                match s.as_bytes() {
                    [base] => Ok(base.to_ascii_uppercase()),
                    _ => Err(Error::InvalidRecalibrationRecord {
                        msg: format!("expected a single base, found '{}'", s),
                    }
                    .into()),
                }
            };
            let trinucleotide = match record.trinucleotide.to_ascii_uppercase().as_bytes() {
                [a, b, c] => [*a, *b, *c],
                _ => {
                    return Err(Error::InvalidRecalibrationRecord {
                        msg: format!(
                            "expected a trinucleotide context, found '{}'",
                            record.trinucleotide
                        ),
                    }
                    .into())
                }
            };
            map.insert(
                single_base(&record.ref_base)?,
                single_base(&record.alt_base)?,
                trinucleotide,
                record.original_quality,
                record.recalibrated_quality,
            );
        }
        info!(
            "loaded {} base quality recalibration entries",
            map.qualities.len()
        );
        Ok(map)
    }

    pub fn insert(
        &mut self,
        ref_base: u8,
        alt_base: u8,
        trinucleotide: [u8; 3],
        quality: u8,
        recalibrated: f64,
    ) {
        self.qualities.insert(
            RecalibrationKey {
                ref_base,
                alt_base,
                trinucleotide,
                quality,
            },
            recalibrated,
        );
    }

    /// Recalibrated quality, falling back to the reported one.
    pub fn quality(&self, ref_base: u8, alt_base: u8, trinucleotide: [u8; 3], quality: u8) -> f64 {
        let key = RecalibrationKey {
            ref_base,
            alt_base,
            trinucleotide,
            quality,
        };
        self.qualities
            .get(&key)
            .copied()
            .unwrap_or(quality as f64)
    }

    pub fn len(&self) -> usize {
        self.qualities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualities.is_empty()
    }
}
