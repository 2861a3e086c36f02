// Posting lists: the stored form of one term's inverted list.

use serde::{Deserialize, Serialize};

use crate::common::DocumentId;

/// One document's entry in an inverted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocumentId,
    pub term_frequency: u32,
    /// Term occurrence positions inside the document, ascending.
    pub locations: Vec<u32>,
}

/// A term's inverted list: postings sorted by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    /// Length of the index unit in characters.
    pub unit_length: u32,
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new(unit_length: u32) -> PostingList {
        PostingList {
            unit_length,
            postings: Vec::new(),
        }
    }

    /// Add a posting, keeping document order.
    pub fn push(&mut self, doc_id: DocumentId, locations: Vec<u32>) {
        debug_assert!(self
            .postings
            .last()
            .map_or(true, |p| p.doc_id < doc_id));
        self.postings.push(Posting {
            doc_id,
            term_frequency: locations.len() as u32,
            locations,
        });
    }

    pub fn document_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}
