//! Per-read quality score, composed of a mapping quality and a base quality component.

use std::cmp;

use crate::config::QualityConfig;
use crate::reference::ReferenceWindow;
use crate::variants::evidence::bases::QualityRecalibrationMap;
use crate::variants::window::SequenceWindow;
use crate::variants::Candidate;

/// Mapping quality minus fixed, pairing and edit event penalties.
pub fn modified_map_quality(
    config: &QualityConfig,
    map_quality: u8,
    events: u32,
    min_number_of_events: u32,
    improper_pair: bool,
) -> f64 {
    let improper_pair_penalty = if improper_pair {
        config.map_quality_improper_pair_penalty()
    } else {
        0.0
    };
    let excess_events = events.saturating_sub(min_number_of_events) as f64;
    map_quality as f64
        - config.map_quality_fixed_penalty()
        - improper_pair_penalty
        - config.map_quality_read_events_penalty() * excess_events
}

/// Base quality minus its fixed penalty, capped by the distance from the read edge.
pub fn modified_base_quality(config: &QualityConfig, base_quality: f64, edge_distance: usize) -> f64 {
    let edge_quality =
        config.read_edge_factor() * edge_distance as f64 - config.read_edge_fixed_penalty();
    (base_quality - config.base_quality_fixed_penalty()).min(edge_quality)
}

pub fn quality_score(map_quality: f64, base_quality: f64) -> f64 {
    map_quality.min(base_quality).max(0.0)
}

/// Penalty for a read whose repeat copy number differs from the template.
pub fn jitter_penalty(config: &QualityConfig, repeat_count: usize) -> f64 {
    let excess = repeat_count.saturating_sub(config.jitter_min_repeat_count());
    config.jitter_penalty() * excess as f64
}

/// Base quality of the variant in the read.
///
/// Equal length alleles take the lowest recalibrated quality over the allele.
/// Indels take the mean quality over the template core.
pub fn variant_base_quality(
    variant: &Candidate,
    quals: &[u8],
    read_index: usize,
    template: &SequenceWindow,
    recalibration: &QualityRecalibrationMap,
    reference: &ReferenceWindow,
) -> f64 {
    if variant.is_indel() {
        let (left, right) = match core_in_read(template, read_index, quals.len()) {
            Some(bounds) => bounds,
            None => return 0.0,
        };
        let core = &quals[left..=right];
        core.iter().map(|q| *q as f64).sum::<f64>() / core.len() as f64
    } else {
        variant
            .ref_allele()
            .iter()
            .zip(variant.alt_allele())
            .enumerate()
            .filter_map(|(i, (ref_base, alt_base))| {
                let quality = *quals.get(read_index + i)?;
                let pos = variant.pos() + i as u64;
                let trinucleotide = reference
                    .trinucleotide(pos)
                    .unwrap_or([b'N', *ref_base, b'N']);
                Some(recalibration.quality(*ref_base, *alt_base, trinucleotide, quality))
            })
            .fold(None, |min: Option<f64>, q| {
                Some(min.map_or(q, |min| min.min(q)))
            })
            .unwrap_or(0.0)
    }
}

/// Read indices of the template core, clamped to the read.
pub(crate) fn core_in_read(
    template: &SequenceWindow,
    read_index: usize,
    read_len: usize,
) -> Option<(usize, usize)> {
    if read_len == 0 {
        return None;
    }
    let left = template
        .map_index(read_index, template.left_core_index())
        .unwrap_or(0);
    let right = template.map_index(read_index, template.right_core_index())?;
    let right = cmp::min(right, read_len - 1);
    if left > right {
        None
    } else {
        Some((left, right))
    }
}

/// Distance of the core from the nearest end of the aligned (not clipped) part of
/// the read.
pub fn read_edge_distance(core_left: usize, core_right: usize, aligned: (usize, usize)) -> usize {
    let (first, last) = aligned;
    cmp::min(
        core_left.saturating_sub(first),
        last.saturating_sub(core_right),
    )
}
