use std::cmp;

use crate::variants::window::WILDCARD;

/// Minimum number of tandem copies for a unit to be considered a repeat.
pub(crate) const MIN_REPEAT_COUNT: usize = 3;
/// Longest repeat unit considered.
pub(crate) const MAX_REPEAT_LEN: usize = 5;

/// A tandem repeat within a base array.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct RepeatContext {
    #[getset(get = "pub")]
    unit: Vec<u8>,
    /// Index of the first base of the first copy.
    #[getset(get_copy = "pub")]
    start_index: usize,
    /// Index of the last base of the last copy.
    #[getset(get_copy = "pub")]
    end_index: usize,
    #[getset(get_copy = "pub")]
    count: usize,
}

impl RepeatContext {
    /// The longest tandem repeat of at least `MIN_REPEAT_COUNT` copies that overlaps
    /// `index`. Among equally long repeats, the shortest unit wins.
    pub fn find(bases: &[u8], index: usize) -> Option<Self> {
        Self::find_in_range(bases, index, index)
    }

    /// Like `find`, but the repeat may overlap any index of `[start, end]`.
    pub fn find_in_range(bases: &[u8], start: usize, end: usize) -> Option<Self> {
        if bases.is_empty() || start >= bases.len() {
            return None;
        }
        let end = cmp::min(end, bases.len() - 1);
        let mut best: Option<RepeatContext> = None;
        for unit_len in 1..=MAX_REPEAT_LEN {
            for unit_start in start.saturating_sub(unit_len - 1)..=end {
                if unit_start + unit_len > bases.len() {
                    break;
                }
                let unit = &bases[unit_start..unit_start + unit_len];
                if !is_primitive_unit(unit) {
                    continue;
                }
                let (first, last) = extend_repeat(bases, unit_start, unit);
                let count = (last - first) / unit_len;
                if count < MIN_REPEAT_COUNT {
                    continue;
                }
                let is_better = best.as_ref().map_or(true, |b| last - first > b.len());
                if is_better {
                    best = Some(RepeatContext {
                        unit: unit.to_vec(),
                        start_index: first,
                        end_index: last - 1,
                        count,
                    });
                }
            }
        }
        best
    }

    /// Number of whole copies of `unit` in `bases` that are in phase with a copy
    /// starting at `index`, extending in both directions.
    pub fn count_at(bases: &[u8], index: usize, unit: &[u8]) -> usize {
        if unit.is_empty()
            || index + unit.len() > bases.len()
            || &bases[index..index + unit.len()] != unit
        {
            return 0;
        }
        let (first, last) = extend_repeat(bases, index, unit);
        (last - first) / unit.len()
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Move the repeat into other coordinates.
    pub(crate) fn rebase(mut self, start_index: usize) -> Self {
        let len = self.len();
        self.start_index = start_index;
        self.end_index = start_index + len - 1;
        self
    }
}

/// Extend a copy of `unit` at `index` to the left and right. Returns the
/// half-open range covered by whole copies.
fn extend_repeat(bases: &[u8], index: usize, unit: &[u8]) -> (usize, usize) {
    let len = unit.len();
    let mut first = index;
    while first >= len && &bases[first - len..first] == unit {
        first -= len;
    }
    let mut last = index + len;
    while last + len <= bases.len() && &bases[last..last + len] == unit {
        last += len;
    }
    (first, last)
}

/// A unit that is not itself a repetition of a shorter unit and contains
/// only called bases.
fn is_primitive_unit(unit: &[u8]) -> bool {
    if unit.iter().any(|b| *b == b'N' || *b == WILDCARD) {
        return false;
    }
    (1..unit.len())
        .filter(|period| unit.len() % period == 0)
        .all(|period| unit.chunks(period).any(|chunk| chunk != &unit[..period]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homopolymer() {
        let bases = b"CGTAAAAAAAAGCT";
        let repeat = RepeatContext::find(bases, 5).unwrap();
        assert_eq!(repeat.unit(), b"A");
        assert_eq!(repeat.count(), 8);
        assert_eq!(repeat.start_index(), 3);
        assert_eq!(repeat.end_index(), 10);
        assert_eq!(repeat.len(), 8);
    }

    #[test]
    fn test_dinucleotide() {
        let bases = b"GGCACACACATTG";
        let repeat = RepeatContext::find(bases, 6).unwrap();
        assert_eq!(repeat.unit(), b"CA");
        assert_eq!(repeat.count(), 4);
        assert_eq!(repeat.start_index(), 2);
        assert_eq!(repeat.end_index(), 9);
    }

    #[test]
    fn test_no_repeat() {
        assert!(RepeatContext::find(b"ACGTACGTTGCA", 5).is_none());
        // two copies are not enough
        assert!(RepeatContext::find(b"GCACATTG", 3).is_none());
        assert!(RepeatContext::find(b"", 0).is_none());
    }

    #[test]
    fn test_find_in_range() {
        let bases = b"ACGTTTTGCA";
        assert!(RepeatContext::find(bases, 1).is_none());
        let repeat = RepeatContext::find_in_range(bases, 1, 3).unwrap();
        assert_eq!(repeat.unit(), b"T");
        assert_eq!(repeat.count(), 4);
    }

    #[test]
    fn test_count_at() {
        let bases = b"CGTAAAAAAAAAGCT";
        assert_eq!(RepeatContext::count_at(bases, 3, b"A"), 9);
        assert_eq!(RepeatContext::count_at(bases, 7, b"A"), 9);
        assert_eq!(RepeatContext::count_at(bases, 1, b"A"), 0);
        assert_eq!(RepeatContext::count_at(bases, 14, b"AA"), 0);
    }

    #[test]
    fn test_primitive_unit() {
        assert!(is_primitive_unit(b"CA"));
        assert!(!is_primitive_unit(b"AA"));
        assert!(!is_primitive_unit(b"CACA"));
        assert!(!is_primitive_unit(b"AN"));
    }
}
