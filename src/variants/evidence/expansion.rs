// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::borrow::Cow;

use rust_htslib::bam::record::Cigar;

use crate::config::SkippedReferenceRegions;
use crate::utils::CigarTraversal;
use crate::variants::window::WILDCARD;

/// Read bases with long skipped reference regions replaced by wildcard runs.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct ExpandedBases<'a> {
    #[getset(get = "pub")]
    bases: Cow<'a, [u8]>,
    #[getset(get_copy = "pub")]
    index: usize,
}

impl<'a> ExpandedBases<'a> {
    pub fn is_expanded(&self) -> bool {
        matches!(self.bases, Cow::Owned(_))
    }
}

/// Inserts a fixed number of wildcard bases wherever a read skips a long
/// stretch of reference (cigar N), so that spliced reads can be compared base
/// by base with a template window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct GapExpander {
    min_len: u32,
    placeholder_len: usize,
}

impl From<SkippedReferenceRegions> for GapExpander {
    fn from(regions: SkippedReferenceRegions) -> Self {
        GapExpander::new(regions.min_len(), regions.placeholder_len())
    }
}

impl GapExpander {
    /// Expand `bases` (aligned as described by `cigar`) and move `read_index`
    /// accordingly. Without qualifying gaps, the bases are borrowed unchanged.
    pub fn expand<'a>(
        &self,
        cigar: &[Cigar],
        bases: &'a [u8],
        read_index: usize,
    ) -> ExpandedBases<'a> {
        // read indices before which placeholders are inserted
        let gaps: Vec<usize> = CigarTraversal::new(cigar, 0)
            .filter(|step| matches!(step.op, Cigar::RefSkip(l) if l >= self.min_len))
            .map(|step| step.read_index)
            .collect();

        if gaps.is_empty() {
            return ExpandedBases {
                bases: Cow::Borrowed(bases),
                index: read_index,
            };
        }

        let mut expanded = Vec::with_capacity(bases.len() + gaps.len() * self.placeholder_len);
        let mut index = read_index;
        let mut last = 0;
        for gap in gaps {
            let gap = gap.min(bases.len());
            expanded.extend_from_slice(&bases[last..gap]);
            expanded.extend(std::iter::repeat(WILDCARD).take(self.placeholder_len));
            if gap <= read_index {
                index += self.placeholder_len;
            }
            last = gap;
        }
        expanded.extend_from_slice(&bases[last..]);

        ExpandedBases {
            bases: Cow::Owned(expanded),
            index,
        }
    }
}
