// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Number of edit events of a read, derived from its edit distance.

use anyhow::Result;
use rust_htslib::bam;
use rust_htslib::bam::record::{Aux, Cigar};

use crate::errors::Error;
use crate::reference::ReferenceWindow;
use crate::utils::{alignment_start, CigarTraversal};
use crate::variants::{Candidate, VariantKind};

/// Edit distance of the record, taken from its NM tag if present and otherwise
/// recomputed against the reference window (bases outside of it are not counted).
pub fn raw_edit_distance(record: &bam::Record, reference: &ReferenceWindow) -> Result<u32> {
    match record.aux(b"NM") {
        Ok(value) => match value {
            Aux::I8(v) => Ok(v.max(0) as u32),
            Aux::U8(v) => Ok(v as u32),
            Aux::I16(v) => Ok(v.max(0) as u32),
            Aux::U16(v) => Ok(v as u32),
            Aux::I32(v) => Ok(v.max(0) as u32),
            Aux::U32(v) => Ok(v),
            _ => Err(Error::InvalidAuxTag {
                tag: "NM".to_owned(),
            }
            .into()),
        },
        Err(_) => Ok(recompute_edit_distance(record, reference)),
    }
}

fn recompute_edit_distance(record: &bam::Record, reference: &ReferenceWindow) -> u32 {
    let cigar = record.cigar();
    let bases = record.seq().as_bytes();
    let mut distance = 0;
    for step in CigarTraversal::new(&cigar, alignment_start(record)) {
        match step.op {
            Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                for i in 0..len as usize {
                    let ref_base = reference.base((step.ref_pos + i as i64) as u64);
                    match (ref_base, bases.get(step.read_index + i)) {
                        (Some(r), Some(b)) if r != b.to_ascii_uppercase() => distance += 1,
                        _ => (),
                    }
                }
            }
            Cigar::Ins(len) | Cigar::Del(len) => distance += len,
            _ => (),
        }
    }
    distance
}

/// Number of independent events: every indel counts once, regardless of its length.
pub fn number_of_events(cigar: &[Cigar], edit_distance: u32) -> u32 {
    let extra_indel_bases: u32 = cigar
        .iter()
        .map(|op| match op {
            Cigar::Ins(len) | Cigar::Del(len) => len.saturating_sub(1),
            _ => 0,
        })
        .sum();
    edit_distance.saturating_sub(extra_indel_bases)
}

/// Like `number_of_events`, but a read carrying a multi base substitution
/// is charged a single event for it.
pub fn number_of_events_with_mnv(events: u32, variant: &Candidate, alt_support: bool) -> u32 {
    if alt_support && variant.kind() == VariantKind::Mnv {
        events.saturating_sub(variant.alt_allele().len() as u32 - 1)
    } else {
        events
    }
}
