// Word-aware location iterator: filters raw string-match positions through
// the corpus token boundaries, according to the word match mode.

use super::grammar::MatchMode;
use super::location::{LocationListIterator, UNDEFINED_LOCATION};

/// Bits reported for matches observed in approximate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WordMatchType(pub u8);

impl WordMatchType {
    pub const HEAD: u8 = 0x1;
    pub const TAIL: u8 = 0x2;
    pub const EXACT: u8 = 0x4;

    pub fn has_head(self) -> bool {
        self.0 & Self::HEAD != 0
    }

    pub fn has_tail(self) -> bool {
        self.0 & Self::TAIL != 0
    }

    pub fn has_exact(self) -> bool {
        self.0 & Self::EXACT != 0
    }
}

/// Verifies string matches against token boundaries.
///
/// In exact-word mode every internal boundary of the search term must
/// coincide with a corpus boundary and the corpus boundaries inside the
/// match must end exactly at term end; simple-word mode checks the head and
/// tail boundaries only; head/tail check one end; approximate passes every
/// match through and accumulates the observed boundary bits.
pub struct WordLocationIterator {
    inner: Box<dyn LocationListIterator>,
    /// Corpus token boundaries of the current document, ascending.
    boundaries: Vec<u32>,
    /// Internal token boundaries of the search term, as offsets strictly
    /// between 0 and the term length. Empty means no internal structure;
    /// that makes exact-word behave like simple-word.
    term_boundaries: Vec<u32>,
    mode: MatchMode,
    match_type: WordMatchType,
    is_end: bool,
}

impl WordLocationIterator {
    pub fn new(
        inner: Box<dyn LocationListIterator>,
        boundaries: Vec<u32>,
        term_boundaries: Vec<u32>,
        mode: MatchMode,
    ) -> WordLocationIterator {
        WordLocationIterator {
            inner,
            boundaries,
            term_boundaries,
            mode,
            match_type: WordMatchType::default(),
            is_end: false,
        }
    }

    /// The boundary bits observed so far, for approximate matches.
    pub fn current_match_type(&self) -> WordMatchType {
        self.match_type
    }

    pub fn is_end(&self) -> bool {
        self.is_end
    }

    fn at_boundary(&self, position: u32) -> bool {
        self.boundaries.binary_search(&position).is_ok()
    }

    /// Corpus boundaries strictly inside (start, end) equal the term's
    /// internal boundaries shifted by start, and nothing else. A term with
    /// no recorded boundary structure cannot be checked this way; it
    /// degrades to the head-and-tail check.
    fn internal_boundaries_align(&self, start: u32, end: u32) -> bool {
        if self.term_boundaries.is_empty() {
            return true;
        }
        let inside: Vec<u32> = self
            .boundaries
            .iter()
            .copied()
            .filter(|&b| b > start && b < end)
            .collect();
        if inside.len() != self.term_boundaries.len() {
            return false;
        }
        inside
            .iter()
            .zip(&self.term_boundaries)
            .all(|(&corpus, &term)| corpus == start + term)
    }

    fn accept(&mut self, location: u32, length: i32) -> bool {
        let end = location + length as u32;
        let head = self.at_boundary(location);
        let tail = self.at_boundary(end);
        match self.mode {
            MatchMode::ExactWord => {
                head && tail && self.internal_boundaries_align(location, end)
            }
            MatchMode::SimpleWord => head && tail,
            MatchMode::WordHead => head,
            MatchMode::WordTail => tail,
            MatchMode::Approximate => {
                let mut bits = 0;
                if head {
                    bits |= WordMatchType::HEAD;
                }
                if tail {
                    bits |= WordMatchType::TAIL;
                }
                if head && tail && self.internal_boundaries_align(location, end) {
                    bits |= WordMatchType::EXACT;
                }
                self.match_type.0 |= bits;
                true
            }
            MatchMode::String => true,
        }
    }
}

impl LocationListIterator for WordLocationIterator {
    fn next(&mut self) -> (u32, i32) {
        loop {
            let (location, length) = self.inner.next();
            if location == UNDEFINED_LOCATION {
                self.is_end = true;
                return (UNDEFINED_LOCATION, 0);
            }
            if self.accept(location, length) {
                return (location, length);
            }
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.is_end = false;
        self.match_type = WordMatchType::default();
    }

    fn lower_bound(&mut self, location: u32) -> (u32, i32) {
        let (mut candidate, mut length) = self.inner.lower_bound(location);
        loop {
            if candidate == UNDEFINED_LOCATION {
                self.is_end = true;
                return (UNDEFINED_LOCATION, 0);
            }
            if self.accept(candidate, length) {
                return (candidate, length);
            }
            let (l, n) = self.inner.next();
            candidate = l;
            length = n;
        }
    }

    fn term_frequency(&mut self) -> u32 {
        self.reset();
        let mut count = 0;
        while self.next().0 != UNDEFINED_LOCATION {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::location::VecLocationIterator;

    // Corpus "ab cd ef": tokens at 0, 3, 6; boundaries {0, 2, 3, 5, 6, 8}
    // (starts and ends).
    fn boundaries() -> Vec<u32> {
        vec![0, 2, 3, 5, 6, 8]
    }

    fn matches(locations: &[u32], length: i32) -> Box<dyn LocationListIterator> {
        Box::new(VecLocationIterator::new(locations.to_vec(), length))
    }

    #[test]
    fn simple_word_needs_both_ends() {
        // "cd" found at 3 (word) and 4 (straddles).
        let mut it = WordLocationIterator::new(
            matches(&[3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::SimpleWord,
        );
        assert_eq!(it.next().0, 3);
        assert_eq!(it.next().0, UNDEFINED_LOCATION);
        assert!(it.is_end());
    }

    #[test]
    fn head_and_tail_modes() {
        let mut head = WordLocationIterator::new(
            matches(&[3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::WordHead,
        );
        assert_eq!(head.next().0, 3);

        // Ends at 4+2=6, a boundary.
        let mut tail = WordLocationIterator::new(
            matches(&[3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::WordTail,
        );
        assert_eq!(tail.next().0, 3);
        assert_eq!(tail.next().0, 4);
    }

    #[test]
    fn exact_word_aligns_internal_boundaries() {
        // Search term "ab cd" of length 5, internal boundaries at 2 and 3
        // (end of "ab", start of "cd").
        let term_boundaries = vec![2, 3];
        let mut it = WordLocationIterator::new(
            matches(&[0], 5),
            boundaries(),
            term_boundaries.clone(),
            MatchMode::ExactWord,
        );
        assert_eq!(it.next().0, 0);

        // The same span with a wrong internal structure fails: corpus has a
        // boundary at 2 inside (0, 5) which the term does not declare.
        let mut it = WordLocationIterator::new(
            matches(&[0], 5),
            boundaries(),
            vec![4],
            MatchMode::ExactWord,
        );
        assert_eq!(it.next().0, UNDEFINED_LOCATION);
    }

    #[test]
    fn exact_without_boundary_structure_degrades_to_simple() {
        // No recorded term boundaries: exact-word accepts what simple-word
        // accepts, nothing less.
        let mut exact = WordLocationIterator::new(
            matches(&[0, 3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::ExactWord,
        );
        let mut simple = WordLocationIterator::new(
            matches(&[0, 3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::SimpleWord,
        );
        loop {
            let e = exact.next().0;
            let s = simple.next().0;
            assert_eq!(e, s);
            if e == UNDEFINED_LOCATION {
                break;
            }
        }
    }

    #[test]
    fn approximate_accumulates_bits() {
        let mut it = WordLocationIterator::new(
            matches(&[3, 4], 2),
            boundaries(),
            vec![],
            MatchMode::Approximate,
        );
        // 3..5 is a whole word: head+tail+exact.
        assert_eq!(it.next().0, 3);
        assert!(it.current_match_type().has_head());
        assert!(it.current_match_type().has_tail());
        assert!(it.current_match_type().has_exact());
        // 4..6 only ends on a boundary; the tail bit was already set.
        assert_eq!(it.next().0, 4);
        assert!(it.current_match_type().has_tail());
    }
}
