// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use itertools::{join, Itertools};
use rust_htslib::bam::record::Cigar;

use crate::reference::ReferenceWindow;
use crate::utils::CigarTraversal;

/// Difference of a stretch of read bases to the reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, new, Getters, CopyGetters)]
pub struct ReadDistance {
    /// Mismatches plus inserted and deleted bases.
    #[getset(get_copy = "pub")]
    distance: u32,
    /// Run-length encoded difference string: M (match), X (mismatch), I, D and S.
    #[getset(get = "pub")]
    cigar: String,
    #[getset(get_copy = "pub")]
    indel_bases: u32,
}

impl ReadDistance {
    /// Score the read bases with indices `[left, right]`.
    ///
    /// Deletions are considered if they lie between two bases of the range.
    /// Bases aligned outside of the reference window count as matches.
    pub fn score(
        cigar: &[Cigar],
        bases: &[u8],
        alignment_start: i64,
        reference: &ReferenceWindow,
        left: usize,
        right: usize,
    ) -> Self {
        let in_range = |i: usize| left <= i && i <= right;
        let mut ops = Vec::new();
        for step in CigarTraversal::new(cigar, alignment_start) {
            match step.op {
                Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                    for i in (0..len as usize).filter(|i| in_range(step.read_index + i)) {
                        let read_base = bases.get(step.read_index + i).map(u8::to_ascii_uppercase);
                        let ref_pos = step.ref_pos + i as i64;
                        let ref_base = if ref_pos > 0 {
                            reference.base(ref_pos as u64)
                        } else {
                            None
                        };
                        match (read_base, ref_base) {
                            (Some(a), Some(b)) if a != b => ops.push('X'),
                            _ => ops.push('M'),
                        }
                    }
                }
                Cigar::Ins(len) => ops.extend(
                    (0..len as usize)
                        .filter(|i| in_range(step.read_index + i))
                        .map(|_| 'I'),
                ),
                Cigar::Del(len) if step.read_index > left && step.read_index <= right => {
                    ops.extend((0..len).map(|_| 'D'))
                }
                Cigar::SoftClip(len) => ops.extend(
                    (0..len as usize)
                        .filter(|i| in_range(step.read_index + i))
                        .map(|_| 'S'),
                ),
                _ => (),
            }
        }

        let distance = ops.iter().filter(|op| matches!(op, 'X' | 'I' | 'D')).count() as u32;
        let indel_bases = ops.iter().filter(|op| matches!(op, 'I' | 'D')).count() as u32;
        let cigar = join(
            ops.into_iter()
                .map(|op| (op, 1))
                .coalesce(|(a, n), (b, m)| {
                    if a == b {
                        Ok((a, n + m))
                    } else {
                        Err(((a, n), (b, m)))
                    }
                })
                .map(|(op, count)| format!("{}{}", count, op)),
            "",
        );

        ReadDistance::new(distance, cigar, indel_bases)
    }
}
