// Operator nodes: the scored layer of the query tree. Term nodes wrap a
// leaf and turn its statistics into a score; logical nodes align their
// children on a document and combine the children's scores.

use crate::common::{DocumentId, UNDEFINED_DOCUMENT_ID};

use super::calculator::{CalculatorArgument, ScoreCalculator};
use super::iterator::ListIterator;
use super::score::ScoreCombiner;
use super::search_info::SearchInformation;
use super::DocumentScore;

pub trait OperatorNode {
    fn reset(&mut self);

    /// Smallest matching document id >= `doc_id`. `is_rough` permits
    /// skipping location verification where a node distinguishes it.
    fn lower_bound(
        &mut self,
        info: &mut SearchInformation,
        doc_id: DocumentId,
        is_rough: bool,
    ) -> DocumentId;

    /// Score of the current document.
    fn get_score(&mut self, info: &mut SearchInformation) -> DocumentScore;

    /// Rough hit-count estimate of the subtree.
    fn get_estimate_count_level1(&mut self, info: &mut SearchInformation) -> usize;

    fn copy(&self) -> Box<dyn OperatorNode>;
}

/// Scored wrapper of one leaf.
pub struct OperatorTermNode {
    leaf: Box<dyn ListIterator>,
    calculator: Box<dyn ScoreCalculator>,
    current: DocumentId,
    /// Cached per-list IDF term.
    idf: Option<f64>,
}

impl OperatorTermNode {
    pub fn new(
        leaf: Box<dyn ListIterator>,
        calculator: Box<dyn ScoreCalculator>,
    ) -> OperatorTermNode {
        OperatorTermNode {
            leaf,
            calculator,
            current: 0,
            idf: None,
        }
    }

    fn argument_values(&mut self, info: &mut SearchInformation) -> Vec<f64> {
        let arguments = self.calculator.arguments();
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = match argument {
                CalculatorArgument::TermFrequency => self.leaf.get_term_frequency() as f64,
                CalculatorArgument::DocumentLength => {
                    info.document_length(self.current).unwrap_or(0) as f64
                }
                CalculatorArgument::AverageDocumentLength => info.average_document_length(),
                CalculatorArgument::DocumentFrequency => {
                    self.leaf.get_estimate_count(info) as f64
                }
                CalculatorArgument::TotalDocumentFrequency => info.document_count() as f64,
                CalculatorArgument::QueryTermFrequency => 1.0,
            };
            values.push(value);
        }
        values
    }
}

impl OperatorNode for OperatorTermNode {
    fn reset(&mut self) {
        self.leaf.reset();
        self.current = 0;
    }

    fn lower_bound(
        &mut self,
        info: &mut SearchInformation,
        doc_id: DocumentId,
        _is_rough: bool,
    ) -> DocumentId {
        self.current = self.leaf.lower_bound(info, doc_id);
        self.current
    }

    fn get_score(&mut self, info: &mut SearchInformation) -> DocumentScore {
        let values = self.argument_values(info);
        let tf_term = self.calculator.first_step(&values);
        let idf_term = match self.idf {
            Some(idf) => idf,
            None => {
                let idf = self.calculator.second_step(&values);
                self.idf = Some(idf);
                idf
            }
        };
        tf_term * idf_term
    }

    fn get_estimate_count_level1(&mut self, info: &mut SearchInformation) -> usize {
        self.leaf.get_estimate_count(info)
    }

    fn copy(&self) -> Box<dyn OperatorNode> {
        Box::new(OperatorTermNode {
            leaf: self.leaf.copy(),
            calculator: self.calculator.copy(),
            current: 0,
            idf: None,
        })
    }
}

/// Conjunction: classical galloping intersection. The current candidate is
/// raised to each child's lower bound; whenever a child overshoots, the
/// scan restarts from the first child at the new candidate.
pub struct OperatorAndNode {
    children: Vec<Box<dyn OperatorNode>>,
    combiner: Box<dyn ScoreCombiner>,
    current: DocumentId,
}

impl OperatorAndNode {
    pub fn new(combiner: Box<dyn ScoreCombiner>) -> OperatorAndNode {
        OperatorAndNode {
            children: Vec::new(),
            combiner,
            current: 0,
        }
    }

    pub fn push_back(&mut self, child: Box<dyn OperatorNode>) {
        self.children.push(child);
    }

    /// Advance past the current document.
    pub fn next(&mut self, info: &mut SearchInformation, is_rough: bool) -> DocumentId {
        if self.current == UNDEFINED_DOCUMENT_ID {
            return UNDEFINED_DOCUMENT_ID;
        }
        let target = self.current + 1;
        self.current = 0;
        self.lower_bound(info, target, is_rough)
    }
}

impl OperatorNode for OperatorAndNode {
    fn reset(&mut self) {
        for child in self.children.iter_mut() {
            child.reset();
        }
        self.current = 0;
    }

    fn lower_bound(
        &mut self,
        info: &mut SearchInformation,
        doc_id: DocumentId,
        is_rough: bool,
    ) -> DocumentId {
        if doc_id <= self.current {
            // A smaller target keeps the current hit.
            return self.current;
        }
        if self.children.is_empty() {
            self.current = UNDEFINED_DOCUMENT_ID;
            return self.current;
        }

        self.current = doc_id;
        let mut index = 0;
        while index < self.children.len() {
            let id = self.children[index].lower_bound(info, self.current, is_rough);
            if id != self.current {
                self.current = id;
                if id == UNDEFINED_DOCUMENT_ID {
                    return UNDEFINED_DOCUMENT_ID;
                }
                if index != 0 {
                    // The document id moved: start over from the first
                    // child.
                    index = 0;
                    continue;
                }
            }
            index += 1;
        }
        self.current
    }

    fn get_score(&mut self, info: &mut SearchInformation) -> DocumentScore {
        let mut children = self.children.iter_mut();
        let mut score = match children.next() {
            Some(first) => first.get_score(info),
            None => return 0.0,
        };
        for child in children {
            score = self.combiner.combine(score, child.get_score(info));
        }
        score
    }

    fn get_estimate_count_level1(&mut self, info: &mut SearchInformation) -> usize {
        let doc_count = info.document_count() as f64;
        if doc_count == 0.0 {
            return 0;
        }
        let mut ratio = 1.0;
        for child in self.children.iter_mut() {
            ratio *= child.get_estimate_count_level1(info) as f64 / doc_count;
        }
        (doc_count * ratio) as usize
    }

    fn copy(&self) -> Box<dyn OperatorNode> {
        let mut copy = OperatorAndNode::new(self.combiner.copy());
        for child in &self.children {
            copy.push_back(child.copy());
        }
        Box::new(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::calculator::TfIdfCalculator;
    use super::super::iterator::SimpleListIterator;
    use super::super::posting::PostingList;
    use super::super::score::SumScoreCombiner;

    fn term(entries: &[(u32, &[u32])]) -> Box<dyn OperatorNode> {
        let mut list = PostingList::new(1);
        for (id, locations) in entries {
            list.push(*id, locations.to_vec());
        }
        Box::new(OperatorTermNode::new(
            Box::new(SimpleListIterator::new(list)),
            Box::new(TfIdfCalculator::default()),
        ))
    }

    #[test]
    fn and_of_singleton_postings() {
        let mut info = SearchInformation::new();
        info.add_document(5, 10);
        let mut node = OperatorAndNode::new(Box::new(SumScoreCombiner));
        node.push_back(term(&[(5, &[10])]));
        node.push_back(term(&[(5, &[12])]));
        assert_eq!(node.next(&mut info, false), 5);
        assert_eq!(node.next(&mut info, false), UNDEFINED_DOCUMENT_ID);
    }

    #[test]
    fn galloping_restarts_on_miss() {
        let mut info = SearchInformation::new();
        let mut node = OperatorAndNode::new(Box::new(SumScoreCombiner));
        node.push_back(term(&[(1, &[1]), (4, &[1]), (9, &[1])]));
        node.push_back(term(&[(2, &[1]), (4, &[1]), (9, &[1]), (12, &[1])]));
        node.push_back(term(&[(4, &[1]), (10, &[1])]));
        assert_eq!(node.lower_bound(&mut info, 1, false), 4);
        assert_eq!(node.next(&mut info, false), UNDEFINED_DOCUMENT_ID);
    }

    #[test]
    fn score_combines_children() {
        let mut info = SearchInformation::new();
        for id in 1..=10 {
            info.add_document(id, 10);
        }
        let mut node = OperatorAndNode::new(Box::new(SumScoreCombiner));
        node.push_back(term(&[(3, &[1, 2])]));
        node.push_back(term(&[(3, &[5])]));
        assert_eq!(node.lower_bound(&mut info, 1, false), 3);
        let score = node.get_score(&mut info);
        assert!(score > 0.0);
    }

    #[test]
    fn empty_and_is_undefined() {
        let mut info = SearchInformation::new();
        let mut node = OperatorAndNode::new(Box::new(SumScoreCombiner));
        assert_eq!(node.lower_bound(&mut info, 1, false), UNDEFINED_DOCUMENT_ID);
    }
}
