// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use rust_htslib::bam;
use rust_htslib::bam::record::Cigar;

use crate::errors::malformed_record;

pub(crate) mod repeats;

/// One cigar operation together with its coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CigarStep {
    pub(crate) op: Cigar,
    pub(crate) next: Option<Cigar>,
    /// Read index of the first base consumed (or that would be consumed) by the operation.
    pub(crate) read_index: usize,
    /// 1-based reference position of the first base spanned by the operation.
    /// Leading soft clips are projected left of the alignment start.
    pub(crate) ref_pos: i64,
    pub(crate) is_leading_clip: bool,
}

impl CigarStep {
    pub(crate) fn len(&self) -> usize {
        self.op.len() as usize
    }

    /// Last reference position spanned by the operation.
    pub(crate) fn ref_end(&self) -> i64 {
        self.ref_pos + self.len() as i64 - 1
    }

    pub(crate) fn contains(&self, pos: i64) -> bool {
        self.ref_pos <= pos && pos <= self.ref_end()
    }
}

/// Walk over cigar operations, tracking read index and reference position.
pub(crate) struct CigarTraversal<'a> {
    ops: &'a [Cigar],
    i: usize,
    read_index: usize,
    ref_pos: i64,
    aligned: bool,
}

impl<'a> CigarTraversal<'a> {
    /// `alignment_start` is the 1-based position of the first aligned base.
    pub(crate) fn new(ops: &'a [Cigar], alignment_start: i64) -> Self {
        CigarTraversal {
            ops,
            i: 0,
            read_index: 0,
            ref_pos: alignment_start,
            aligned: false,
        }
    }
}

impl<'a> Iterator for CigarTraversal<'a> {
    type Item = CigarStep;

    fn next(&mut self) -> Option<CigarStep> {
        let op = *self.ops.get(self.i)?;
        let len = op.len();
        let mut step = CigarStep {
            op,
            next: self.ops.get(self.i + 1).copied(),
            read_index: self.read_index,
            ref_pos: self.ref_pos,
            is_leading_clip: false,
        };
        match op {
            Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_) => {
                self.read_index += len as usize;
                self.ref_pos += len as i64;
                self.aligned = true;
            }
            Cigar::Ins(_) => {
                self.read_index += len as usize;
                self.aligned = true;
            }
            Cigar::Del(_) | Cigar::RefSkip(_) => {
                self.ref_pos += len as i64;
                self.aligned = true;
            }
            Cigar::SoftClip(_) => {
                if !self.aligned {
                    step.ref_pos -= len as i64;
                    step.is_leading_clip = true;
                }
                self.read_index += len as usize;
            }
            Cigar::HardClip(_) | Cigar::Pad(_) => (),
        }
        self.i += 1;
        Some(step)
    }
}

/// 1-based position of the first aligned base.
pub(crate) fn alignment_start(record: &bam::Record) -> i64 {
    record.pos() + 1
}

pub(crate) fn query_len(cigar: &[Cigar]) -> usize {
    cigar
        .iter()
        .map(|op| match op {
            Cigar::Match(l)
            | Cigar::Ins(l)
            | Cigar::SoftClip(l)
            | Cigar::Equal(l)
            | Cigar::Diff(l) => *l as usize,
            _ => 0,
        })
        .sum()
}

/// Read indices of the first and last base not soft clipped.
pub(crate) fn aligned_bounds(cigar: &[Cigar], seq_len: usize) -> (usize, usize) {
    let clip_len = |op: Option<&Cigar>| match op {
        Some(Cigar::SoftClip(l)) => *l as usize,
        _ => 0,
    };
    let leading = clip_len(cigar.iter().find(|op| !matches!(op, Cigar::HardClip(_))));
    let trailing = clip_len(
        cigar
            .iter()
            .rev()
            .find(|op| !matches!(op, Cigar::HardClip(_))),
    );
    (
        leading,
        seq_len.saturating_sub(trailing).saturating_sub(1),
    )
}

/// Ensure that cigar, sequence and qualities of the record agree in length.
pub(crate) fn validate_record(record: &bam::Record) -> Result<()> {
    let cigar = record.cigar();
    let expected = query_len(&cigar);
    if expected != record.seq_len() {
        return Err(malformed_record(
            record.qname(),
            &format!(
                "cigar {} covers {} bases but sequence has {}",
                *cigar,
                expected,
                record.seq_len()
            ),
        )
        .into());
    }
    if record.qual().len() != record.seq_len() {
        return Err(malformed_record(
            record.qname(),
            "base qualities and sequence differ in length",
        )
        .into());
    }
    Ok(())
}

/// Whether the read lacks a correctly oriented mate.
pub(crate) fn is_improper_pair(record: &bam::Record) -> bool {
    record.is_paired() && !record.is_proper_pair()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal() {
        let cigar = vec![
            Cigar::HardClip(3),
            Cigar::SoftClip(2),
            Cigar::Match(5),
            Cigar::Ins(2),
            Cigar::Match(3),
            Cigar::Del(4),
            Cigar::Match(2),
            Cigar::SoftClip(1),
        ];
        let steps: Vec<_> = CigarTraversal::new(&cigar, 100).collect();
        assert_eq!(steps.len(), 8);
        assert_eq!(steps[1].ref_pos, 98);
        assert!(steps[1].is_leading_clip);
        assert_eq!(steps[2].read_index, 2);
        assert_eq!(steps[2].ref_pos, 100);
        assert_eq!(steps[2].next, Some(Cigar::Ins(2)));
        assert_eq!(steps[3].read_index, 7);
        assert_eq!(steps[3].ref_pos, 105);
        assert_eq!(steps[5].ref_pos, 108);
        assert!(steps[5].contains(111));
        assert!(!steps[5].contains(112));
        assert_eq!(steps[6].read_index, 12);
        assert_eq!(steps[6].ref_pos, 112);
        assert_eq!(steps[7].ref_pos, 114);
        assert!(!steps[7].is_leading_clip);
    }

    #[test]
    fn test_aligned_bounds() {
        let cigar = vec![
            Cigar::HardClip(3),
            Cigar::SoftClip(2),
            Cigar::Match(10),
            Cigar::SoftClip(3),
        ];
        assert_eq!(query_len(&cigar), 15);
        assert_eq!(aligned_bounds(&cigar, 15), (2, 11));
        assert_eq!(aligned_bounds(&[Cigar::Match(10)], 10), (0, 9));
    }

    #[test]
    fn test_validate_record() {
        let mut record = bam::Record::new();
        record.set(
            b"r1",
            Some(&bam::record::CigarString(vec![Cigar::Match(4)])),
            b"ACGTA",
            &[30; 5],
        );
        assert!(validate_record(&record).is_err());

        record.set(
            b"r1",
            Some(&bam::record::CigarString(vec![Cigar::SoftClip(1), Cigar::Match(4)])),
            b"ACGTA",
            &[30; 5],
        );
        assert!(validate_record(&record).is_ok());
    }
}
