// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp;
use std::iter;

use crate::utils::repeats::RepeatContext;
use crate::variants::window::{shift, SequenceWindow};

/// Smallest search radius, enough to cover slippage of short repeat units.
pub const MIN_REPEAT_SCAN: usize = 3;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RealignmentKind {
    None,
    Exact,
    Lengthened,
    Shortened,
}

impl Default for RealignmentKind {
    fn default() -> Self {
        RealignmentKind::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, new, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Realignment {
    kind: RealignmentKind,
    /// Repeat units observed in the read (or the template, for exact realignments).
    repeat_count: usize,
}

impl Realignment {
    pub fn none() -> Self {
        Realignment::default()
    }

    /// Whether the read differs from the template by whole repeat units.
    pub fn is_jitter(&self) -> bool {
        matches!(
            self.kind,
            RealignmentKind::Lengthened | RealignmentKind::Shortened
        )
    }
}

/// Offsets ordered by absolute value, negative first: 0, -1, 1, -2, 2, ...
pub(crate) fn offsets(radius: usize) -> impl Iterator<Item = isize> {
    let radius = radius as isize;
    iter::once(0).chain((1..=radius).flat_map(|d| vec![-d, d]))
}

/// Search radius for a read whose window around the variant contains
/// `read_indel_bases` inserted or deleted bases.
pub fn search_radius(template: &SequenceWindow, read_indel_bases: usize) -> usize {
    let half_width = cmp::max(
        template.index() - template.left_core_index(),
        template.right_core_index() - template.index(),
    );
    cmp::max(cmp::max(half_width, read_indel_bases), MIN_REPEAT_SCAN)
}

/// Try to explain a read that does not match the template at its naive index.
///
/// The closest offset giving an exact core and flank match wins. Otherwise, if
/// the template spans a repeat, the read's copy number of the repeat unit
/// decides whether the read is lengthened or shortened.
pub fn realign(
    template: &SequenceWindow,
    repeat: Option<&RepeatContext>,
    read_index: usize,
    read_bases: &[u8],
    read_indel_bases: usize,
) -> Realignment {
    let radius = search_radius(template, read_indel_bases);
    let exact = offsets(radius)
        .filter_map(|offset| shift(read_index, offset))
        .any(|index| template.exact_match_at(index, read_bases));
    if exact {
        return Realignment::new(
            RealignmentKind::Exact,
            repeat.map_or(0, |repeat| repeat.count()),
        );
    }

    let repeat = match repeat {
        Some(repeat) => repeat,
        None => return Realignment::none(),
    };
    let read_count = template
        .map_index(read_index, repeat.start_index())
        .map_or(0, |start| {
            RepeatContext::count_at(read_bases, start, repeat.unit())
        });
    if read_count == 0 || read_count == repeat.count() {
        Realignment::none()
    } else if read_count > repeat.count() {
        Realignment::new(RealignmentKind::Lengthened, read_count)
    } else {
        Realignment::new(RealignmentKind::Shortened, read_count)
    }
}
