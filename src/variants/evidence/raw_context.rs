// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use rust_htslib::bam;
use rust_htslib::bam::record::Cigar;

use crate::utils::{alignment_start, validate_record, CigarStep, CigarTraversal};
use crate::variants::{Candidate, VariantKind};

/// Quick, flank-unaware relation of a read to a candidate variant, obtained from a
/// single pass over the cigar string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct RawContext {
    /// Read index of the variant position, if any operation covers it.
    read_index: Option<usize>,
    in_delete: bool,
    in_skipped: bool,
    in_soft_clip: bool,
    alt_support: bool,
    ref_support: bool,
    depth_support: bool,
    base_quality: u8,
}

impl RawContext {
    /// Classify the record against the variant. The first cigar operation
    /// spanning the variant position determines the result.
    pub fn classify(record: &bam::Record, variant: &Candidate) -> Result<Self> {
        validate_record(record)?;
        let cigar = record.cigar();
        let bases = record.seq().as_bytes();
        let quals = record.qual();

        Ok(CigarTraversal::new(&cigar, alignment_start(record))
            .find_map(|step| Self::from_step(&step, variant, &bases, quals))
            .unwrap_or_default())
    }

    pub fn has_index(&self) -> bool {
        self.read_index.is_some()
    }

    fn from_step(
        step: &CigarStep,
        variant: &Candidate,
        bases: &[u8],
        quals: &[u8],
    ) -> Option<Self> {
        let pos = variant.pos() as i64;
        match step.op {
            Cigar::SoftClip(_) if step.contains(pos) => {
                let offset = pos - step.ref_pos;
                let index = if step.is_leading_clip {
                    // bases right of an inserted or deleted stretch are aligned
                    offset - variant.indel_len()
                } else {
                    step.read_index as i64 + offset
                };
                if index < 0 {
                    return Some(RawContext {
                        in_soft_clip: true,
                        ..Default::default()
                    });
                }
                let index = index as usize;
                let alt = variant.alt_allele();
                Some(RawContext {
                    read_index: Some(index),
                    in_soft_clip: true,
                    alt_support: bases.get(index..index + alt.len()) == Some(alt.as_slice()),
                    base_quality: quals.get(index).copied().unwrap_or(0),
                    ..Default::default()
                })
            }
            Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) if step.contains(pos) => {
                let index = step.read_index + (pos - step.ref_pos) as usize;
                match variant.kind() {
                    VariantKind::Insertion | VariantKind::Deletion => {
                        if pos == step.ref_end() && opens_indel(step.next, variant.kind()) {
                            // the indel operation that follows decides
                            return None;
                        }
                        Some(RawContext {
                            read_index: Some(index),
                            ref_support: bases[index] == variant.ref_allele()[0],
                            depth_support: true,
                            base_quality: quals[index],
                            ..Default::default()
                        })
                    }
                    VariantKind::Snv | VariantKind::Mnv => {
                        let alt = variant.alt_allele();
                        let fits = step.ref_end() - pos + 1 >= alt.len() as i64;
                        let alt_support = fits && &bases[index..index + alt.len()] == alt.as_slice();
                        let base_quality = if alt_support {
                            min_quality(&quals[index..index + alt.len()])
                        } else {
                            quals[index]
                        };
                        Some(RawContext {
                            read_index: Some(index),
                            alt_support,
                            ref_support: !alt_support && bases[index] == variant.ref_allele()[0],
                            depth_support: true,
                            base_quality,
                            ..Default::default()
                        })
                    }
                }
            }
            Cigar::Ins(len)
                if variant.kind() == VariantKind::Insertion
                    && step.read_index > 0
                    && pos == step.ref_pos - 1 =>
            {
                let index = step.read_index - 1;
                let alt_support = len as i64 == variant.indel_len()
                    && bases[index] == variant.alt_allele()[0];
                let end = (index + variant.alt_allele().len()).min(quals.len());
                Some(RawContext {
                    read_index: Some(index),
                    alt_support,
                    ref_support: false,
                    depth_support: true,
                    base_quality: min_quality(&quals[index..end]),
                    ..Default::default()
                })
            }
            Cigar::Del(len) => {
                if variant.kind() == VariantKind::Deletion
                    && step.read_index > 0
                    && pos == step.ref_pos - 1
                {
                    let index = step.read_index - 1;
                    let alt_support = len as i64 == -variant.indel_len()
                        && bases[index] == variant.alt_allele()[0];
                    let end = (index + 2).min(quals.len());
                    Some(RawContext {
                        read_index: Some(index),
                        alt_support,
                        depth_support: true,
                        base_quality: min_quality(&quals[index..end]),
                        ..Default::default()
                    })
                } else if step.contains(pos) {
                    Some(RawContext {
                        read_index: Some(step.read_index.saturating_sub(1)),
                        in_delete: true,
                        depth_support: true,
                        ..Default::default()
                    })
                } else {
                    None
                }
            }
            Cigar::RefSkip(_) if step.contains(pos) => Some(RawContext {
                in_skipped: true,
                ..Default::default()
            }),
            _ => None,
        }
    }
}

fn opens_indel(next: Option<Cigar>, kind: VariantKind) -> bool {
    matches!(
        (next, kind),
        (Some(Cigar::Ins(_)), VariantKind::Insertion) | (Some(Cigar::Del(_)), VariantKind::Deletion)
    )
}

fn min_quality(quals: &[u8]) -> u8 {
    quals.iter().copied().min().unwrap_or(0)
}
