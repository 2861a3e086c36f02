// Query terms: the element carrying the per-term statistics and expansion
// parameters, the bounded pool ranked by selection value, and the map from
// terms to their postings over the seed documents.

use std::collections::HashMap;

use crate::common::DocumentId;

/// Category of a query term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermType {
    Undefined,
    Essential,
    Important,
    Helpful,
    EssentialRelated,
    ImportantRelated,
    HelpfulRelated,
}

/// One query term with its statistics and retrieval parameters.
#[derive(Debug, Clone)]
pub struct TermElement {
    /// Surface form.
    pub string: String,
    /// Normalized form used for matching.
    pub normalized: String,
    pub term_type: TermType,
    pub position: u32,
    pub language: String,
    /// Mixed document/seed weight.
    pub weight: f64,
    /// Scale applied to the term's score contribution.
    pub scale: f64,
    /// Average frequency over the seed documents.
    pub tf: f64,
    /// Document frequency over the collection.
    pub df: f64,
    /// Seed-document frequency.
    pub sdf: f64,
    /// Selection value; the pool ranks by this.
    pub tsv: f64,
    /// Pattern weighting value.
    pub twv: f64,
    pub is_bigram: bool,
    // Per-term retrieval parameters, set by the expansion passes.
    pub param_weight: f64,
    pub param_score: f64,
    pub param_length: f64,
    pub param_proximity: i32,
}

impl TermElement {
    pub fn new(string: impl Into<String>) -> TermElement {
        let string = string.into();
        TermElement {
            normalized: string.clone(),
            string,
            term_type: TermType::Undefined,
            position: 0,
            language: String::new(),
            weight: 0.0,
            scale: 0.0,
            tf: 1.0,
            df: 0.0,
            sdf: 0.0,
            tsv: 1.0,
            twv: 1.0,
            is_bigram: false,
            param_weight: 0.0,
            param_score: 0.0,
            param_length: 0.0,
            param_proximity: 0,
        }
    }
}

/// Bounded set of terms ranked by selection value. When full, a new term
/// displaces the current minimum only if it ranks higher; the minimum is
/// computed lazily and cached until the pool changes shape.
pub struct TermPool {
    max_size: usize,
    terms: Vec<TermElement>,
    index: HashMap<String, usize>,
    /// Cached minimum selection value; `None` until the pool first fills.
    min_tsv: Option<f64>,
    num_unigram: usize,
    num_bigram: usize,
}

impl TermPool {
    pub fn new(max_size: usize) -> TermPool {
        TermPool {
            max_size,
            terms: Vec::new(),
            index: HashMap::new(),
            min_tsv: None,
            num_unigram: 0,
            num_bigram: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Shrink the capacity; used when the expansion confidence decides how
    /// many expanded terms to keep.
    pub fn resize(&mut self, max_size: usize) {
        self.max_size = max_size;
        if self.terms.len() > max_size {
            self.sort_by_tsv();
            while self.terms.len() > max_size {
                let removed = self.terms.pop().unwrap();
                self.forget(&removed);
            }
            self.reindex();
        }
    }

    pub fn num_unigram(&self) -> usize {
        self.num_unigram
    }

    pub fn num_bigram(&self) -> usize {
        self.num_bigram
    }

    pub fn get(&self, string: &str) -> Option<&TermElement> {
        self.index.get(string).map(|&i| &self.terms[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermElement> {
        self.terms.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TermElement> {
        self.terms.iter_mut()
    }

    /// Register a term.
    ///
    /// A term already pooled accumulates frequency and selection value. A
    /// new term enters directly while the pool has room; once full, it must
    /// beat the pooled minimum, which it then displaces.
    pub fn insert_term(&mut self, element: TermElement) {
        if self.max_size == 0 {
            return;
        }
        if let Some(&existing) = self.index.get(&element.string) {
            let pooled = &mut self.terms[existing];
            pooled.tf += element.tf;
            pooled.tsv += element.tsv;
            return;
        }

        if self.terms.len() < self.max_size {
            self.count(&element);
            self.index.insert(element.string.clone(), self.terms.len());
            self.terms.push(element);
            return;
        }

        let min_tsv = match self.min_tsv {
            Some(value) => value,
            None => {
                let value = self.scan_min_tsv();
                self.min_tsv = Some(value);
                value
            }
        };
        if min_tsv > element.tsv {
            // Does not rank above the pooled minimum.
            return;
        }

        // Displace the minimum.
        let victim = self
            .terms
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.tsv.partial_cmp(&b.tsv).unwrap())
            .map(|(i, _)| i)
            .expect("pool is full, so non-empty");
        let removed = self.terms.swap_remove(victim);
        self.forget(&removed);
        self.index.remove(&removed.string);
        if victim < self.terms.len() {
            // swap_remove moved the tail element into the hole.
            self.index.insert(self.terms[victim].string.clone(), victim);
        }
        self.count(&element);
        self.index.insert(element.string.clone(), self.terms.len());
        self.terms.push(element);
        self.min_tsv = Some(self.scan_min_tsv());
    }

    /// Drop every term whose selection value is at or below `threshold`.
    pub fn erase_term(&mut self, threshold: f64) {
        let kept: Vec<TermElement> = self
            .terms
            .drain(..)
            .filter(|t| t.tsv > threshold)
            .collect();
        self.num_unigram = 0;
        self.num_bigram = 0;
        self.terms = kept;
        for term in &self.terms {
            if term.is_bigram {
                self.num_bigram += 1;
            } else {
                self.num_unigram += 1;
            }
        }
        self.reindex();
        self.min_tsv = None;
    }

    /// Sort descending by selection value.
    pub fn sort_by_tsv(&mut self) {
        self.terms
            .sort_by(|a, b| b.tsv.partial_cmp(&a.tsv).unwrap());
        self.reindex();
        self.min_tsv = None;
    }

    fn scan_min_tsv(&self) -> f64 {
        self.terms
            .iter()
            .map(|t| t.tsv)
            .fold(f64::INFINITY, f64::min)
    }

    fn count(&mut self, element: &TermElement) {
        if element.is_bigram {
            self.num_bigram += 1;
        } else {
            self.num_unigram += 1;
        }
    }

    fn forget(&mut self, element: &TermElement) {
        if element.is_bigram {
            self.num_bigram -= 1;
        } else {
            self.num_unigram -= 1;
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.string.clone(), i))
            .collect();
    }
}

/// term -> posting list over the seed documents: (document id, frequency).
#[derive(Debug, Default)]
pub struct TermMap {
    postings: HashMap<String, Vec<(DocumentId, u32)>>,
    documents: Vec<DocumentId>,
    confidence: f64,
}

impl TermMap {
    pub fn new() -> TermMap {
        TermMap::default()
    }

    /// Record one occurrence of `term` in seed document `doc_id`.
    pub fn insert_term(&mut self, doc_id: DocumentId, term: &TermElement) {
        if !self.documents.contains(&doc_id) {
            self.documents.push(doc_id);
        }
        let posting = self.postings.entry(term.string.clone()).or_default();
        match posting.iter_mut().find(|(id, _)| *id == doc_id) {
            Some((_, tf)) => *tf += 1,
            None => posting.push((doc_id, 1)),
        }
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    pub fn find(&self, term: &str) -> Option<&Vec<(DocumentId, u32)>> {
        self.postings.get(term)
    }

    pub fn erase(&mut self, term: &str) {
        self.postings.remove(term);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<(DocumentId, u32)>)> {
        self.postings.iter()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(name: &str, tsv: f64) -> TermElement {
        let mut t = TermElement::new(name);
        t.tsv = tsv;
        t
    }

    #[test]
    fn duplicate_accumulates() {
        let mut pool = TermPool::new(4);
        pool.insert_term(term("a", 1.0));
        pool.insert_term(term("a", 2.0));
        assert_eq!(pool.len(), 1);
        let a = pool.get("a").unwrap();
        assert_eq!(a.tsv, 3.0);
        assert_eq!(a.tf, 2.0);
    }

    #[test]
    fn full_pool_keeps_top_ranked() {
        let mut pool = TermPool::new(2);
        pool.insert_term(term("low", 0.1));
        pool.insert_term(term("mid", 0.5));
        // Below the minimum: rejected.
        pool.insert_term(term("lower", 0.05));
        assert!(pool.get("lower").is_none());
        // Above the minimum: displaces "low".
        pool.insert_term(term("high", 0.9));
        assert!(pool.get("low").is_none());
        assert!(pool.get("mid").is_some());
        assert!(pool.get("high").is_some());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn zero_capacity_ignores_inserts() {
        let mut pool = TermPool::new(0);
        pool.insert_term(term("x", 1.0));
        assert!(pool.is_empty());
    }

    #[test]
    fn sort_and_resize() {
        let mut pool = TermPool::new(8);
        for (name, tsv) in [("a", 0.3), ("b", 0.9), ("c", 0.5)] {
            pool.insert_term(term(name, tsv));
        }
        pool.sort_by_tsv();
        let order: Vec<&str> = pool.iter().map(|t| t.string.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        pool.resize(2);
        assert_eq!(pool.len(), 2);
        assert!(pool.get("a").is_none());
    }

    #[test]
    fn unigram_bigram_counts() {
        let mut pool = TermPool::new(4);
        pool.insert_term(term("a", 1.0));
        let mut bigram = term("a b", 1.0);
        bigram.is_bigram = true;
        pool.insert_term(bigram);
        assert_eq!(pool.num_unigram(), 1);
        assert_eq!(pool.num_bigram(), 1);
    }

    #[test]
    fn map_tracks_postings_and_docs() {
        let mut map = TermMap::new();
        let t = TermElement::new("word");
        map.insert_term(1, &t);
        map.insert_term(1, &t);
        map.insert_term(2, &t);
        assert_eq!(map.num_docs(), 2);
        let posting = map.find("word").unwrap();
        assert_eq!(posting, &vec![(1, 2), (2, 1)]);
        map.erase("word");
        assert!(map.find("word").is_none());
    }
}
