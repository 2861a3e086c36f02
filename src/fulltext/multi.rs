// Merging iterators: the per-unit merge (a document lives in exactly one
// unit) and the hard-ceiling wrapper used during batch merges.

use crate::common::{DocumentId, UNDEFINED_DOCUMENT_ID};

use super::iterator::ListIterator;
use super::location::LocationListIterator;
use super::search_info::SearchInformation;

/// Merge of per-unit inverted lists. Tracks the element currently holding
/// the minimum document id and the minimum across the others, so a `next`
/// that stays below the other units' minimum advances only one child.
pub struct MultiListIterator {
    /// (current document id of the child, the child). A missing unit is
    /// carried as `None` and pinned at the end sentinel.
    children: Vec<(DocumentId, Option<Box<dyn ListIterator>>)>,
    current_id: DocumentId,
    other_minimum_id: DocumentId,
    current_element: Option<usize>,
    found: bool,
}

impl MultiListIterator {
    pub fn new() -> MultiListIterator {
        MultiListIterator {
            children: Vec::new(),
            current_id: 0,
            other_minimum_id: 0,
            current_element: None,
            found: false,
        }
    }

    pub fn push_back(&mut self, iterator: Option<Box<dyn ListIterator>>) {
        let id = if iterator.is_none() {
            UNDEFINED_DOCUMENT_ID
        } else {
            0
        };
        self.children.push((id, iterator));
    }

    /// Recompute the minimum and the next-minimum across children.
    fn set(&mut self) {
        self.found = false;
        self.current_id = UNDEFINED_DOCUMENT_ID;
        self.other_minimum_id = UNDEFINED_DOCUMENT_ID;
        self.current_element = None;
        for (element, (id, _)) in self.children.iter().enumerate() {
            if *id == UNDEFINED_DOCUMENT_ID {
                continue;
            }
            if self.current_id > *id {
                self.other_minimum_id = self.current_id;
                self.current_id = *id;
                self.current_element = Some(element);
            } else if self.other_minimum_id > *id {
                self.other_minimum_id = *id;
            }
        }
    }

    fn reset_impl(&mut self) {
        for (id, child) in self.children.iter_mut() {
            if let Some(child) = child {
                *id = 0;
                child.reset();
            }
        }
        self.current_id = 0;
        self.other_minimum_id = 0;
        self.current_element = None;
        self.found = false;
    }

    fn lower_bound_impl(
        &mut self,
        info: &mut SearchInformation,
        doc_id: DocumentId,
    ) -> DocumentId {
        if self.current_id > doc_id {
            // Going backward: start over.
            self.reset_impl();
        }

        if self.current_id < doc_id && self.other_minimum_id > doc_id {
            // The target can only be in the current element.
            if let Some(element) = self.current_element {
                let (id, child) = &mut self.children[element];
                if let Some(child) = child {
                    *id = child.lower_bound(info, doc_id);
                    if *id < self.other_minimum_id {
                        self.current_id = *id;
                        return self.current_id;
                    }
                }
            }
        }

        // Reposition every non-exhausted element.
        for (id, child) in self.children.iter_mut() {
            if *id != UNDEFINED_DOCUMENT_ID {
                if let Some(child) = child {
                    *id = child.lower_bound(info, doc_id);
                }
            }
        }
        self.set();
        self.current_id
    }

    fn current_child(&mut self) -> Option<&mut Box<dyn ListIterator>> {
        let element = self.current_element?;
        self.children[element].1.as_mut()
    }
}

impl Default for MultiListIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl ListIterator for MultiListIterator {
    fn reset(&mut self) {
        self.reset_impl();
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        if self.current_id == UNDEFINED_DOCUMENT_ID {
            return self.current_id;
        }

        if self.found {
            // `find` positioned us without knowing the neighbors; fall back
            // to a lower bound from the current document.
            let current = self.current_id;
            self.reset_impl();
            self.lower_bound_impl(info, current);
        }

        match self.current_element {
            None => {
                // First step: advance everything, then take the minimum.
                for (id, child) in self.children.iter_mut() {
                    if let Some(child) = child {
                        *id = child.next(info);
                    }
                }
                self.set();
                self.current_id
            }
            Some(element) => {
                let (id, child) = &mut self.children[element];
                if let Some(child) = child {
                    *id = child.next(info);
                }
                if self.children[element].0 < self.other_minimum_id {
                    // Still the minimum; no need to look at the others.
                    self.current_id = self.children[element].0;
                    self.current_id
                } else {
                    self.set();
                    self.current_id
                }
            }
        }
    }

    fn find(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> bool {
        for (element, (id, child)) in self.children.iter_mut().enumerate() {
            if let Some(child) = child {
                if child.find(info, doc_id) {
                    *id = doc_id;
                    self.current_id = doc_id;
                    self.current_element = Some(element);
                    self.found = true;
                    return true;
                }
            }
        }
        self.current_id = UNDEFINED_DOCUMENT_ID;
        false
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        self.lower_bound_impl(info, doc_id)
    }

    fn get_term_frequency(&mut self) -> u32 {
        match self.current_child() {
            Some(child) => child.get_term_frequency(),
            None => 0,
        }
    }

    fn get_location_list_iterator(&mut self) -> Option<Box<dyn LocationListIterator>> {
        self.current_child()?.get_location_list_iterator()
    }

    fn get_estimate_count(&mut self, info: &mut SearchInformation) -> usize {
        // The same document never appears in two units; counts add.
        let mut count = 0;
        for (_, child) in self.children.iter_mut() {
            if let Some(child) = child {
                count += child.get_estimate_count(info);
            }
        }
        count
    }

    fn get_length(&mut self) -> u32 {
        // Every unit indexes the same way; ask the first live child.
        for (_, child) in self.children.iter_mut() {
            if let Some(child) = child {
                return child.get_length();
            }
        }
        0
    }

    fn copy(&self) -> Box<dyn ListIterator> {
        let mut copy = MultiListIterator::new();
        for (_, child) in &self.children {
            copy.push_back(child.as_ref().map(|c| c.copy()));
        }
        Box::new(copy)
    }
}

/// Truncates a list at a hard document-id ceiling, used while a batch is
/// merging so readers never step past the pre-merge maximum.
pub struct ListIteratorWithMax {
    inner: Box<dyn ListIterator>,
    max_document_id: DocumentId,
}

impl ListIteratorWithMax {
    pub fn new(inner: Box<dyn ListIterator>, max_document_id: DocumentId) -> ListIteratorWithMax {
        ListIteratorWithMax {
            inner,
            max_document_id,
        }
    }

    fn clip(&self, doc_id: DocumentId) -> DocumentId {
        if doc_id == UNDEFINED_DOCUMENT_ID || doc_id > self.max_document_id {
            UNDEFINED_DOCUMENT_ID
        } else {
            doc_id
        }
    }
}

impl ListIterator for ListIteratorWithMax {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn next(&mut self, info: &mut SearchInformation) -> DocumentId {
        let id = self.inner.next(info);
        self.clip(id)
    }

    fn find(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> bool {
        doc_id <= self.max_document_id && self.inner.find(info, doc_id)
    }

    fn lower_bound(&mut self, info: &mut SearchInformation, doc_id: DocumentId) -> DocumentId {
        if doc_id > self.max_document_id {
            return UNDEFINED_DOCUMENT_ID;
        }
        let id = self.inner.lower_bound(info, doc_id);
        self.clip(id)
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
        Box::new(ListIteratorWithMax {
            inner: self.inner.copy(),
            max_document_id: self.max_document_id,
        })
    }
}
