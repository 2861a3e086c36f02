// Leaf nodes of the query-execution tree. Every leaf walks documents like a
// list iterator; the compound ones add their own document predicate and
// location arithmetic on top of their children.

use crate::common::{DocumentId, UNDEFINED_DOCUMENT_ID};

use super::iterator::ListIterator;
use super::location::{
    LocationListIterator, MergedLocationIterator, NormalShortLocationIterator, UNDEFINED_LOCATION,
};
use super::search_info::SearchInformation;

/// Leaf over a single inverted list.
pub struct SimpleLeafNode {
    inner: Box<dyn ListIterator>,
}

impl SimpleLeafNode {
    pub fn new(inner: Box<dyn ListIterator>) -> SimpleLeafNode {
        SimpleLeafNode { inner }
    }
}

impl ListIterator for SimpleLeafNode {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        self.inner.next(info)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.inner.lower_bound(info, doc_id)
    }

    fn get_term_frequency(&mut self) -> u32 {
        self.inner.get_term_frequency()
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        self.inner.get_location_list_iterator()
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        self.inner.get_estimate_count(info)
    }

    fn get_length(&mut self) -> u32 {
        self.inner.get_length()
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        Box::new(SimpleLeafNode {
            inner: self.inner.copy(),
        })
    }
}

/// Leaf over the expansion of a short word: every index unit with the same
/// prefix contributes a child, and a document matches when any child does.
///
/// Head-of-sentence handling can put the same position into more than one
/// index unit, so the term frequency is not the sum of the children's; it
/// is recomputed by walking the merged location list and counting distinct
/// positions. That is what makes ranked short-word searches slow.
pub struct ShortLeafNode {
    children: Vec<(DocumentId, Box<dyn ListIterator>)>,
    /// Length of the search term.
    length: i32,
    current: DocumentId,
    term_frequency: Option<u32>,
}

impl ShortLeafNode {
    pub fn new(length: i32) -> ShortLeafNode {
        ShortLeafNode {
            children: Vec::new(),
            length,
            current: 0,
            term_frequency: None,
        }
    }

    pub fn push_back(&mut self, child: Box<dyn ListIterator>) {
        self.children.push((0, child));
    }

    fn merged_locations(&mut self) -> MergedLocationIterator {
        let mut parts = Vec::new();
        for (id, child) in self.children.iter_mut() {
            if *id == self.current {
                if let Some(locations) = child.get_location_list_iterator() {
                    parts.push(locations);
                }
            }
        }
        MergedLocationIterator::new(parts)
    }
}

impl ListIterator for ShortLeafNode {
    fn reset(&mut self) {
        for (id, child) in self.children.iter_mut() {
            *id = 0;
            child.reset();
        }
        self.current = 0;
        self.term_frequency = None;
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        let target = if self.current == UNDEFINED_DOCUMENT_ID {
            return UNDEFINED_DOCUMENT_ID;
        } else {
            self.current + 1
        };
        self.lower_bound(info, target)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.term_frequency = None;
        let mut minimum = UNDEFINED_DOCUMENT_ID;
        for (id, child) in self.children.iter_mut() {
            if *id != UNDEFINED_DOCUMENT_ID || doc_id <= self.current {
                *id = child.lower_bound(info, doc_id);
            }
            minimum = minimum.min(*id);
        }
        self.current = minimum;
        minimum
    }

    fn get_term_frequency(&mut self) -> u32 {
        if let Some(tf) = self.term_frequency {
            return tf;
        }
        let mut locations = self.merged_locations();
        let mut count = 0;
        let mut previous = UNDEFINED_LOCATION;
        loop {
            let (location, _) = locations.next();
            if location == UNDEFINED_LOCATION {
                break;
            }
            if location != previous {
                count += 1;
                previous = location;
            }
        }
        self.term_frequency = Some(count);
        count
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        Some(Box::new(self.merged_locations()))
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        self.children
            .iter_mut()
            .map(|(_, child)| child.get_estimate_count(info))
            .sum()
    }

    fn get_length(&mut self) -> u32 {
        self.length as u32
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        let mut copy = ShortLeafNode::new(self.length);
        for (_, child) in &self.children {
            copy.push_back(child.copy());
        }
        Box::new(copy)
    }
}

/// Concatenation of a normal leaf with a short-leaf tail: a document
/// matches when both sides do and the short side occurs exactly at
/// `normal location + offset`.
pub struct NormalShortLeafNode {
    normal: Box<dyn ListIterator>,
    short: Box<dyn ListIterator>,
    /// Length of the normal part.
    offset: u32,
    current: DocumentId,
    term_frequency: Option<u32>,
}

impl NormalShortLeafNode {
    pub fn new(
        normal: Box<dyn ListIterator>,
        short: Box<dyn ListIterator>,
        offset: u32,
    ) -> NormalShortLeafNode {
        NormalShortLeafNode {
            normal,
            short,
            offset,
            current: 0,
            term_frequency: None,
        }
    }

    fn verified_locations(&mut self) -> Option<NormalShortLocationIterator> {
        let normal = self.normal.get_location_list_iterator()?;
        let short = self.short.get_location_list_iterator()?;
        Some(NormalShortLocationIterator::new(normal, short, self.offset))
    }
}

impl ListIterator for NormalShortLeafNode {
    fn reset(&mut self) {
        self.normal.reset();
        self.short.reset();
        self.current = 0;
        self.term_frequency = None;
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        if self.current == UNDEFINED_DOCUMENT_ID {
            return UNDEFINED_DOCUMENT_ID;
        }
        self.lower_bound(info, self.current + 1)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.term_frequency = None;
        let mut candidate = doc_id;
        loop {
            // Both sides must hold the document.
            let normal = self.normal.lower_bound(info, candidate);
            if normal == UNDEFINED_DOCUMENT_ID {
                self.current = UNDEFINED_DOCUMENT_ID;
                return self.current;
            }
            if !self.short.find(info, normal) {
                candidate = normal + 1;
                continue;
            }
            // And the concatenated location must exist.
            let verified = match self.verified_locations() {
                Some(mut locations) => locations.next().0 != UNDEFINED_LOCATION,
                None => false,
            };
            if verified {
                self.current = normal;
                return self.current;
            }
            candidate = normal + 1;
        }
    }

    fn get_term_frequency(&mut self) -> u32 {
        if let Some(tf) = self.term_frequency {
            return tf;
        }
        let count = match self.verified_locations() {
            Some(mut locations) => locations.term_frequency(),
            None => 0,
        };
        self.term_frequency = Some(count);
        count
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        self.verified_locations()
            .map(|l| Box::new(l) as Box<dyn LocationListIterator>)
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        // The normal side is the selective one.
        self.normal.get_estimate_count(info)
    }

    fn get_length(&mut self) -> u32 {
        self.offset + self.short.get_length()
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        Box::new(NormalShortLeafNode {
            normal: self.normal.copy(),
            short: self.short.copy(),
            offset: self.offset,
            current: 0,
            term_frequency: None,
        })
    }
}

/// Conjunction leaf: a document matches when every child holds it. The
/// estimate assumes independent children: `N * prod(df_i / N)`, at least 1.
pub struct AndLeafNode {
    children: Vec<Box<dyn ListIterator>>,
    current: DocumentId,
}

impl AndLeafNode {
    pub fn new() -> AndLeafNode {
        AndLeafNode {
            children: Vec::new(),
            current: 0,
        }
    }

    pub fn push_back(&mut self, child: Box<dyn ListIterator>) {
        self.children.push(child);
    }
}

impl Default for AndLeafNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ListIterator for AndLeafNode {
    fn reset(&mut self) {
        for child in self.children.iter_mut() {
            child.reset();
        }
        self.current = 0;
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        if self.current == UNDEFINED_DOCUMENT_ID {
            return UNDEFINED_DOCUMENT_ID;
        }
        self.lower_bound(info, self.current + 1)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        if self.children.is_empty() {
            self.current = UNDEFINED_DOCUMENT_ID;
            return self.current;
        }
        let mut candidate = doc_id;
        'align: loop {
            for child in self.children.iter_mut() {
                let id = child.lower_bound(info, candidate);
                if id == UNDEFINED_DOCUMENT_ID {
                    // Any exhausted child ends the whole leaf.
                    self.current = UNDEFINED_DOCUMENT_ID;
                    return self.current;
                }
                if id != candidate {
                    candidate = id;
                    continue 'align;
                }
            }
            self.current = candidate;
            return self.current;
        }
    }

    fn get_term_frequency(&mut self) -> u32 {
        // The scarcest child bounds the conjunction.
        self.children
            .iter_mut()
            .map(|c| c.get_term_frequency())
            .min()
            .unwrap_or(0)
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        let mut parts = Vec::new();
        for child in self.children.iter_mut() {
            parts.push(child.get_location_list_iterator()?);
        }
        Some(Box::new(MergedLocationIterator::new(parts)))
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        let doc_count = info.document_count() as f64;
        if doc_count == 0.0 {
            return 1;
        }
        let mut ratio = 1.0;
        for child in self.children.iter_mut() {
            ratio *= child.get_estimate_count(info) as f64 / doc_count;
        }
        let count = (doc_count * ratio) as usize;
        count.max(1)
    }

    fn get_length(&mut self) -> u32 {
        self.children
            .iter_mut()
            .map(|c| c.get_length())
            .max()
            .unwrap_or(0)
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        let mut copy = AndLeafNode::new();
        for child in &self.children {
            copy.push_back(child.copy());
        }
        Box::new(copy)
    }
}

/// Leaf over an array-valued field: one child per element, a document
/// matches when any element's list does.
pub struct ArrayLeafNode {
    inner: ShortLeafNode,
}

impl ArrayLeafNode {
    pub fn new(length: i32) -> ArrayLeafNode {
        ArrayLeafNode {
            inner: ShortLeafNode::new(length),
        }
    }

    pub fn push_back(&mut self, child: Box<dyn ListIterator>) {
        self.inner.push_back(child);
    }
}

impl ListIterator for ArrayLeafNode {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        self.inner.next(info)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.inner.lower_bound(info, doc_id)
    }

    fn get_term_frequency(&mut self) -> u32 {
        self.inner.get_term_frequency()
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        self.inner.get_location_list_iterator()
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        self.inner.get_estimate_count(info)
    }

    fn get_length(&mut self) -> u32 {
        self.inner.get_length()
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        let mut rebuilt = ShortLeafNode::new(self.inner.length);
        for (_, child) in &self.inner.children {
            rebuilt.push_back(child.copy());
        }
        Box::new(ArrayLeafNode { inner: rebuilt })
    }
}

/// Single-child pass-through leaf, the seam for node decoration.
pub struct UnaryLeafNode {
    inner: Box<dyn ListIterator>,
}

impl UnaryLeafNode {
    pub fn new(inner: Box<dyn ListIterator>) -> UnaryLeafNode {
        UnaryLeafNode { inner }
    }
}

impl ListIterator for UnaryLeafNode {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        self.inner.next(info)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.inner.lower_bound(info, doc_id)
    }

    fn get_term_frequency(&mut self) -> u32 {
        self.inner.get_term_frequency()
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        self.inner.get_location_list_iterator()
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        self.inner.get_estimate_count(info)
    }

    fn get_length(&mut self) -> u32 {
        self.inner.get_length()
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        Box::new(UnaryLeafNode {
            inner: self.inner.copy(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::iterator::SimpleListIterator;
    use super::super::posting::PostingList;

    fn simple_with_locations(entries: &[(u32, &[u32])]) -> Box<dyn ListIterator> {
        let mut list = PostingList::new(1);
        for (id, locations) in entries {
            list.push(*id, locations.to_vec());
        }
        Box::new(SimpleListIterator::new(list))
    }

    #[test]
    fn short_leaf_merges_children() {
        let mut info = SearchInformation::new();
        let mut leaf = ShortLeafNode::new(2);
        leaf.push_back(simple_with_locations(&[(1, &[5]), (4, &[9])]));
        leaf.push_back(simple_with_locations(&[(2, &[3]), (4, &[9, 11])]));
        assert_eq!(leaf.next(&mut info), 1);
        assert_eq!(leaf.next(&mut info), 2);
        assert_eq!(leaf.next(&mut info), 4);
        // Position 9 occurs in both children: counted once.
        assert_eq!(leaf.get_term_frequency(), 2);
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
        assert_eq!(leaf.get_estimate_count(&mut info), 4);
    }

    #[test]
    fn and_leaf_requires_all_children() {
        let mut info = SearchInformation::new();
        for _ in 0..10 {
            info.add_document(0, 1);
        }
        let mut leaf = AndLeafNode::new();
        leaf.push_back(simple_with_locations(&[(1, &[1]), (3, &[1]), (7, &[1])]));
        leaf.push_back(simple_with_locations(&[(3, &[2]), (7, &[2]), (9, &[2])]));
        assert_eq!(leaf.next(&mut info), 3);
        assert_eq!(leaf.next(&mut info), 7);
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
    }

    #[test]
    fn and_leaf_estimate_is_at_least_one() {
        let mut info = SearchInformation::new();
        for id in 0..100 {
            info.add_document(id, 1);
        }
        let mut leaf = AndLeafNode::new();
        leaf.push_back(simple_with_locations(&[(1, &[1])]));
        leaf.push_back(simple_with_locations(&[(2, &[1])]));
        // 100 * (1/100) * (1/100) rounds to 0, clamped to 1.
        assert_eq!(leaf.get_estimate_count(&mut info), 1);
    }

    #[test]
    fn normal_short_verifies_adjacency() {
        let mut info = SearchInformation::new();
        // doc 1: normal at 5, short at 7 (offset 2 matches).
        // doc 2: both present but not adjacent.
        let normal = simple_with_locations(&[(1, &[5]), (2, &[10])]);
        let short = simple_with_locations(&[(1, &[7]), (2, &[20])]);
        let mut leaf = NormalShortLeafNode::new(normal, short, 2);
        assert_eq!(leaf.next(&mut info), 1);
        assert_eq!(leaf.get_term_frequency(), 1);
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
    }

    #[test]
    fn empty_and_leaf_is_undefined() {
        let mut info = SearchInformation::new();
        let mut leaf = AndLeafNode::new();
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
    }

    #[test]
    fn array_leaf_matches_any_element() {
        let mut info = SearchInformation::new();
        let mut leaf = ArrayLeafNode::new(1);
        leaf.push_back(simple_with_locations(&[(2, &[1])]));
        leaf.push_back(simple_with_locations(&[(5, &[3])]));
        assert_eq!(leaf.next(&mut info), 2);
        assert_eq!(leaf.next(&mut info), 5);
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
        let mut copy = leaf.copy();
        copy.reset();
        assert_eq!(copy.next(&mut info), 2);
    }

    #[test]
    fn unary_leaf_passes_through() {
        let mut info = SearchInformation::new();
        let mut leaf = UnaryLeafNode::new(simple_with_locations(&[(3, &[7, 9])]));
        assert_eq!(leaf.next(&mut info), 3);
        assert_eq!(leaf.get_term_frequency(), 2);
        assert_eq!(leaf.get_length(), 1);
        assert_eq!(leaf.next(&mut info), UNDEFINED_DOCUMENT_ID);
    }
}
