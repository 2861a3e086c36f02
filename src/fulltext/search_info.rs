// The collection statistics a search runs against: document count, lengths,
// and their per-unit concatenation. Built from the document metadata vector
// at open time, or assembled directly in tests.

use std::collections::HashMap;

use crate::common::DocumentId;

#[derive(Debug, Clone, Default)]
pub struct SearchInformation {
    document_count: u32,
    total_document_length: u64,
    max_document_id: DocumentId,
    document_lengths: HashMap<DocumentId, u32>,
}

impl SearchInformation {
    pub fn new() -> SearchInformation {
        SearchInformation::default()
    }

    /// Register one document's length.
    pub fn add_document(&mut self, doc_id: DocumentId, length: u32) {
        self.document_count += 1;
        self.total_document_length += length as u64;
        self.max_document_id = self.max_document_id.max(doc_id);
        self.document_lengths.insert(doc_id, length);
    }

    pub fn document_count(&self) -> u32 {
        self.document_count
    }

    pub fn total_document_length(&self) -> u64 {
        self.total_document_length
    }

    pub fn max_document_id(&self) -> DocumentId {
        self.max_document_id
    }

    pub fn average_document_length(&self) -> f64 {
        if self.document_count == 0 {
            0.0
        } else {
            self.total_document_length as f64 / self.document_count as f64
        }
    }

    /// Length of one document; `None` when it is not stored.
    pub fn document_length(&self, doc_id: DocumentId) -> Option<u32> {
        self.document_lengths.get(&doc_id).copied()
    }

    /// Merge per-unit statistics into a view over the whole index. A
    /// document belongs to exactly one unit, so counts simply add.
    pub fn concatenate(units: Vec<SearchInformation>) -> SearchInformation {
        let mut merged = SearchInformation::new();
        for unit in units {
            merged.document_count += unit.document_count;
            merged.total_document_length += unit.total_document_length;
            merged.max_document_id = merged.max_document_id.max(unit.max_document_id);
            merged.document_lengths.extend(unit.document_lengths);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_average() {
        let mut info = SearchInformation::new();
        info.add_document(1, 10);
        info.add_document(4, 30);
        assert_eq!(info.document_count(), 2);
        assert_eq!(info.average_document_length(), 20.0);
        assert_eq!(info.document_length(4), Some(30));
        assert_eq!(info.document_length(2), None);
        assert_eq!(info.max_document_id(), 4);
    }

    #[test]
    fn concatenate_sums_units() {
        let mut a = SearchInformation::new();
        a.add_document(1, 10);
        let mut b = SearchInformation::new();
        b.add_document(9, 50);
        let merged = SearchInformation::concatenate(vec![a, b]);
        assert_eq!(merged.document_count(), 2);
        assert_eq!(merged.total_document_length(), 60);
        assert_eq!(merged.max_document_id(), 9);
    }
}
