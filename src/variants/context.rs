// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Construction of the template read context of a candidate variant.

use std::cmp;

use anyhow::Result;
use rust_htslib::bam;
use rust_htslib::bam::record::Cigar;

use crate::errors::Error;
use crate::reference::ReferenceWindow;
use crate::utils::alignment_start;
use crate::utils::repeats::RepeatContext;
use crate::variants::evidence::distance::ReadDistance;
use crate::variants::window::SequenceWindow;
use crate::variants::{Candidate, VariantKind};

/// Minimum number of bases between the variant and either end of the core.
pub const MIN_CORE_DISTANCE: usize = 2;

/// The template every read is compared against, together with the sequence
/// features around the variant.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct VariantContext {
    window: SequenceWindow,
    /// Repeat in window coordinates, if one overlaps the variant.
    repeat: Option<RepeatContext>,
    microhomology: Vec<u8>,
    /// Difference of the template bases to the reference.
    distance: ReadDistance,
}

impl VariantContext {
    /// Whether gap placeholders in the core are tolerated when matching reads.
    pub fn wildcards_in_core(&self, variant: &Candidate) -> bool {
        variant.kind() == VariantKind::Snv && self.microhomology.is_empty()
    }

    pub fn repeat_count(&self) -> usize {
        self.repeat.as_ref().map_or(0, |repeat| repeat.count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, new, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ContextBuilder {
    flank_size: usize,
}

impl ContextBuilder {
    /// Build the template from a read supporting the variant. `read_index` is the
    /// index of the variant position (the anchor base for indels) in the read.
    pub fn build(
        &self,
        variant: &Candidate,
        reference: &ReferenceWindow,
        record: &bam::Record,
        read_index: usize,
    ) -> Result<VariantContext> {
        let bases = record.seq().as_bytes();
        let cigar = record.cigar();
        self.build_from_bases(
            variant,
            reference,
            &bases,
            read_index,
            &cigar,
            alignment_start(record),
        )
    }

    /// Build the template from the reference with the alt allele applied.
    pub fn build_from_reference(
        &self,
        variant: &Candidate,
        reference: &ReferenceWindow,
    ) -> Result<VariantContext> {
        let index = reference
            .index(variant.pos())
            .ok_or_else(|| Error::ReferenceWindowOutOfBounds {
                contig: reference.contig().to_owned(),
                pos: variant.pos(),
            })?;
        let ref_len = variant.ref_allele().len();
        let alt_len = variant.alt_allele().len();
        let suffix_start = cmp::min(index + ref_len, reference.len());

        let mut haplotype = reference.bases()[..index].to_vec();
        haplotype.extend_from_slice(variant.alt_allele());
        haplotype.extend_from_slice(&reference.bases()[suffix_start..]);

        let suffix_len = (reference.len() - suffix_start) as u32;
        let cigar = match variant.kind() {
            VariantKind::Snv | VariantKind::Mnv => vec![Cigar::Match(haplotype.len() as u32)],
            VariantKind::Insertion => vec![
                Cigar::Match(index as u32 + 1),
                Cigar::Ins((alt_len - ref_len) as u32),
                Cigar::Match(suffix_len),
            ],
            VariantKind::Deletion => vec![
                Cigar::Match(index as u32 + 1),
                Cigar::Del((ref_len - alt_len) as u32),
                Cigar::Match(suffix_len),
            ],
        };

        self.build_from_bases(
            variant,
            reference,
            &haplotype,
            index,
            &cigar,
            reference.start() as i64,
        )
    }

    fn build_from_bases(
        &self,
        variant: &Candidate,
        reference: &ReferenceWindow,
        bases: &[u8],
        read_index: usize,
        cigar: &[Cigar],
        alignment_start: i64,
    ) -> Result<VariantContext> {
        if read_index >= bases.len() {
            return Err(Error::InvalidWindow {
                msg: format!(
                    "variant index {} exceeds {} bases",
                    read_index,
                    bases.len()
                ),
            }
            .into());
        }

        let microhomology = microhomology(variant, reference, bases, read_index);
        let mh_len = microhomology.len();
        let alt_len = variant.alt_allele().len();

        let mut left = read_index.saturating_sub(MIN_CORE_DISTANCE);
        let mut right = match variant.kind() {
            VariantKind::Snv | VariantKind::Mnv => read_index + alt_len - 1 + MIN_CORE_DISTANCE,
            VariantKind::Insertion => read_index + (alt_len - 1) + mh_len + MIN_CORE_DISTANCE,
            VariantKind::Deletion => read_index + 1 + mh_len + MIN_CORE_DISTANCE,
        };
        let mut repeat = None;
        if variant.is_indel() {
            left = left.saturating_sub(mh_len);

            let scan_end = cmp::min(right, bases.len() - 1);
            if let Some(read_repeat) = RepeatContext::find_in_range(bases, read_index, scan_end) {
                left = cmp::min(left, read_repeat.start_index().saturating_sub(1));
                right = cmp::max(right, read_repeat.end_index() + 1);
                repeat = Some(read_repeat);
            }
            if let Some((start, end)) = reference_repeat_span(variant, reference, read_index) {
                left = cmp::min(left, start.saturating_sub(1));
                right = cmp::max(right, end + 1);
            }
        }
        let right = cmp::min(right, bases.len() - 1);

        let window = SequenceWindow::extract(
            variant.pos(),
            read_index,
            left,
            right,
            self.flank_size,
            bases,
        )?;
        let offset = read_index - window.index();
        let repeat = repeat.map(|repeat: RepeatContext| {
            let start = repeat.start_index() - offset.min(repeat.start_index());
            repeat.rebase(start)
        });
        let distance = ReadDistance::score(
            cigar,
            bases,
            alignment_start,
            reference,
            offset + window.left_flank_index(),
            offset + window.right_flank_index(),
        );

        debug!(
            "template for {}: {} (core {}..={}, repeat count {}, microhomology {})",
            variant,
            String::from_utf8_lossy(window.bases()),
            window.left_core_index(),
            window.right_core_index(),
            repeat.as_ref().map_or(0, |r: &RepeatContext| r.count()),
            String::from_utf8_lossy(&microhomology),
        );

        Ok(VariantContext {
            window,
            repeat,
            microhomology,
            distance,
        })
    }
}

/// Span of a reference repeat around the variant, projected into read coordinates.
fn reference_repeat_span(
    variant: &Candidate,
    reference: &ReferenceWindow,
    read_index: usize,
) -> Option<(usize, usize)> {
    let ref_index = reference.index(variant.pos())?;
    let scan_end = cmp::min(
        ref_index + variant.ref_allele().len(),
        reference.len().saturating_sub(1),
    );
    let repeat = RepeatContext::find_in_range(reference.bases(), ref_index, scan_end)?;
    let project = |i: usize| -> Option<usize> {
        if i <= ref_index {
            read_index.checked_sub(ref_index - i)
        } else {
            let shifted = (read_index + (i - ref_index)) as i64 + variant.indel_len();
            if shifted > read_index as i64 {
                Some(shifted as usize)
            } else {
                Some(read_index + 1)
            }
        }
    };
    Some((project(repeat.start_index())?, project(repeat.end_index())?))
}

/// Bases of the indel that could equally be placed further left or right.
/// The longest stretch found in either direction on reference or read wins,
/// ties go to the one found first.
pub fn microhomology(
    variant: &Candidate,
    reference: &ReferenceWindow,
    bases: &[u8],
    read_index: usize,
) -> Vec<u8> {
    let (indel, ref_index) = match variant.kind() {
        VariantKind::Insertion => (&variant.alt_allele()[1..], reference.index(variant.pos())),
        VariantKind::Deletion => (&variant.ref_allele()[1..], reference.index(variant.pos())),
        _ => return Vec::new(),
    };
    let ref_index = match ref_index {
        Some(ref_index) => ref_index,
        None => return Vec::new(),
    };

    // sequence following the indel and sequence up to and including the anchor
    let ref_after_start = match variant.kind() {
        VariantKind::Deletion => ref_index + 1 + indel.len(),
        _ => ref_index + 1,
    };
    let ref_after = reference.bases().get(ref_after_start..).unwrap_or(&[]);
    let ref_before = &reference.bases()[..=ref_index];

    let read_after_start = match variant.kind() {
        VariantKind::Insertion => read_index + 1 + indel.len(),
        _ => read_index + 1,
    };
    let read_after = bases.get(read_after_start..).unwrap_or(&[]);
    let read_before = &bases[..=read_index];

    let candidates = [
        common_prefix(indel, ref_after),
        common_prefix(indel, read_after),
        common_suffix(indel, ref_before),
        common_suffix(indel, read_before),
    ];
    candidates
        .iter()
        .min_by_key(|candidate| cmp::Reverse(candidate.len()))
        .map(|candidate| candidate.to_vec())
        .unwrap_or_default()
}

fn common_prefix<'a>(indel: &'a [u8], other: &[u8]) -> &'a [u8] {
    let len = indel
        .iter()
        .zip(other)
        .take_while(|(a, b)| a == b)
        .count();
    &indel[..len]
}

fn common_suffix<'a>(indel: &'a [u8], other: &[u8]) -> &'a [u8] {
    let len = indel
        .iter()
        .rev()
        .zip(other.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    &indel[indel.len() - len..]
}
