// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::cmp;

use anyhow::Result;

use crate::errors::Error;

/// Placeholder base standing in for skipped reference regions. It compares
/// equal to any base.
pub const WILDCARD: u8 = b'.';

/// Strength of a read context match, ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchResult {
    None,
    Core,
    Partial,
    Full,
}

pub(crate) fn bases_eq(a: u8, b: u8) -> bool {
    a == b || a == WILDCARD || b == WILDCARD
}

/// An immutable slice of bases anchored at a genomic position, with a core
/// `[left_core_index, right_core_index]` and flanks of up to `flank_size` bases.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct SequenceWindow {
    #[getset(get_copy = "pub")]
    position: u64,
    #[getset(get_copy = "pub")]
    index: usize,
    #[getset(get_copy = "pub")]
    left_core_index: usize,
    #[getset(get_copy = "pub")]
    right_core_index: usize,
    #[getset(get_copy = "pub")]
    flank_size: usize,
    #[getset(get_copy = "pub")]
    left_flank_index: usize,
    #[getset(get_copy = "pub")]
    right_flank_index: usize,
    #[getset(get = "pub")]
    bases: Vec<u8>,
}

impl SequenceWindow {
    pub fn new(
        position: u64,
        index: usize,
        left_core_index: usize,
        right_core_index: usize,
        flank_size: usize,
        bases: Vec<u8>,
    ) -> Result<Self> {
        if !(left_core_index <= index && index <= right_core_index) {
            return Err(Error::InvalidWindow {
                msg: format!(
                    "index {} not within core [{}, {}]",
                    index, left_core_index, right_core_index
                ),
            }
            .into());
        }
        if right_core_index >= bases.len() {
            return Err(Error::InvalidWindow {
                msg: format!(
                    "core end {} exceeds {} bases",
                    right_core_index,
                    bases.len()
                ),
            }
            .into());
        }
        Ok(SequenceWindow {
            position,
            index,
            left_core_index,
            right_core_index,
            flank_size,
            left_flank_index: left_core_index.saturating_sub(flank_size),
            right_flank_index: cmp::min(bases.len() - 1, right_core_index + flank_size),
            bases,
        })
    }

    /// Copy core and flanks out of a longer base array, rebasing all indices.
    pub fn extract(
        position: u64,
        index: usize,
        left_core_index: usize,
        right_core_index: usize,
        flank_size: usize,
        source: &[u8],
    ) -> Result<Self> {
        if right_core_index >= source.len() {
            return Err(Error::InvalidWindow {
                msg: format!(
                    "core end {} exceeds {} bases",
                    right_core_index,
                    source.len()
                ),
            }
            .into());
        }
        let start = left_core_index.saturating_sub(flank_size);
        let end = cmp::min(source.len() - 1, right_core_index + flank_size);
        SequenceWindow::new(
            position,
            index.saturating_sub(start),
            left_core_index.saturating_sub(start),
            right_core_index - start,
            flank_size,
            source[start..=end].to_vec(),
        )
    }

    /// The same bases and core with a different flank size.
    pub fn with_flank_size(&self, flank_size: usize) -> Self {
        SequenceWindow {
            flank_size,
            left_flank_index: self.left_core_index.saturating_sub(flank_size),
            right_flank_index: cmp::min(self.bases.len() - 1, self.right_core_index + flank_size),
            bases: self.bases.clone(),
            ..*self
        }
    }

    pub fn core(&self) -> &[u8] {
        &self.bases[self.left_core_index..=self.right_core_index]
    }

    pub fn core_len(&self) -> usize {
        self.right_core_index - self.left_core_index + 1
    }

    pub fn left_flank_len(&self) -> usize {
        self.left_core_index - self.left_flank_index
    }

    pub fn right_flank_len(&self) -> usize {
        self.right_flank_index - self.right_core_index
    }

    /// Whether both flanks reach the full flank size.
    pub fn is_complete(&self) -> bool {
        self.left_flank_len() == self.flank_size && self.right_flank_len() == self.flank_size
    }

    /// Translate an index of this window into the coordinates of a base array
    /// whose anchor lies at `other_index`.
    pub fn map_index(&self, other_index: usize, own_index: usize) -> Option<usize> {
        if own_index >= self.index {
            other_index.checked_add(own_index - self.index)
        } else {
            other_index.checked_sub(self.index - own_index)
        }
    }

    /// Whether a base array of length `other_len` anchored at `other_index`
    /// contains the entire core.
    pub fn is_core_covered(&self, other_index: usize, other_len: usize) -> bool {
        match (
            self.map_index(other_index, self.left_core_index),
            self.map_index(other_index, self.right_core_index),
        ) {
            (Some(_), Some(right)) => right < other_len,
            _ => false,
        }
    }

    pub fn core_match(&self, other_index: usize, other_bases: &[u8], wildcards: bool) -> bool {
        if !self.is_core_covered(other_index, other_bases.len()) {
            return false;
        }
        let other_left = other_index + self.left_core_index - self.index;
        self.core()
            .iter()
            .zip(&other_bases[other_left..other_left + self.core_len()])
            .all(|(a, b)| if wildcards { bases_eq(*a, *b) } else { a == b })
    }

    /// Number of left flank bases matching, up to the shorter of both flanks.
    /// `None` if a base mismatches or the core is not covered.
    pub fn left_flank_match(&self, other_index: usize, other_bases: &[u8]) -> Option<usize> {
        if !self.is_core_covered(other_index, other_bases.len()) {
            return None;
        }
        let other_left_core = self.map_index(other_index, self.left_core_index)?;
        let max_len = cmp::min(self.left_flank_len(), other_left_core);
        for i in 1..=max_len {
            if !bases_eq(self.bases[self.left_core_index - i], other_bases[other_left_core - i]) {
                return None;
            }
        }
        Some(max_len)
    }

    /// Number of right flank bases matching, up to the shorter of both flanks.
    /// `None` if a base mismatches or the core is not covered.
    pub fn right_flank_match(&self, other_index: usize, other_bases: &[u8]) -> Option<usize> {
        if !self.is_core_covered(other_index, other_bases.len()) {
            return None;
        }
        let other_right_core = self.map_index(other_index, self.right_core_index)?;
        let available = other_bases.len() - other_right_core - 1;
        let max_len = cmp::min(self.right_flank_len(), available);
        for i in 1..=max_len {
            if !bases_eq(
                self.bases[self.right_core_index + i],
                other_bases[other_right_core + i],
            ) {
                return None;
            }
        }
        Some(max_len)
    }

    /// Compare this window against `other_bases` anchored at `other_index`.
    ///
    /// With `wildcards`, placeholders are tolerated in the core and a core
    /// match without qualifying flanks is reported as `Core`.
    pub fn match_at(&self, other_index: usize, other_bases: &[u8], wildcards: bool) -> MatchResult {
        if !self.is_complete() || !self.core_match(other_index, other_bases, wildcards) {
            return MatchResult::None;
        }

        let left = self.left_flank_match(other_index, other_bases);
        let right = self.right_flank_match(other_index, other_bases);
        match (left, right) {
            (Some(left), Some(right)) if left == self.flank_size && right == self.flank_size => {
                MatchResult::Full
            }
            (Some(left), Some(right)) if left == self.flank_size || right == self.flank_size => {
                MatchResult::Partial
            }
            _ if wildcards => MatchResult::Core,
            _ => MatchResult::None,
        }
    }

    pub fn match_window(&self, other: &SequenceWindow, wildcards: bool) -> MatchResult {
        self.match_window_with_offset(other, 0, wildcards)
    }

    /// Match against `other` with its anchor shifted by `offset`.
    ///
    /// Each window is compared with its own core and flanks against the other,
    /// the weaker result wins. Hence `a` vs `b` at `offset` equals `b` vs `a`
    /// at `-offset`, also for windows with different cores.
    pub fn match_window_with_offset(
        &self,
        other: &SequenceWindow,
        offset: isize,
        wildcards: bool,
    ) -> MatchResult {
        match (shift(other.index, offset), shift(self.index, -offset)) {
            (Some(other_index), Some(own_index)) => cmp::min(
                self.match_at(other_index, &other.bases, wildcards),
                other.match_at(own_index, &self.bases, wildcards),
            ),
            _ => MatchResult::None,
        }
    }

    /// Core and both full flanks match without any mismatch.
    pub fn exact_match_at(&self, other_index: usize, other_bases: &[u8]) -> bool {
        self.is_complete()
            && self.core_match(other_index, other_bases, true)
            && self.left_flank_match(other_index, other_bases) == Some(self.flank_size)
            && self.right_flank_match(other_index, other_bases) == Some(self.flank_size)
    }
}

pub(crate) fn shift(index: usize, offset: isize) -> Option<usize> {
    if offset >= 0 {
        index.checked_add(offset as usize)
    } else {
        index.checked_sub(offset.unsigned_abs())
    }
}
