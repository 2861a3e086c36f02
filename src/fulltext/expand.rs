// Feedback expansion: weight the initial terms against the seed documents,
// select expansion terms from the candidate pool, and merge the two result
// sets in rank space.

use crate::common::DocumentId;

use super::blocker::Blocker;
use super::term::{TermElement, TermMap, TermPool};

/// A ranked result set: (document id, score), best first.
pub type RankedResult = Vec<(DocumentId, f64)>;

#[derive(Debug, Clone)]
pub struct ExpandParameters {
    /// Registered document count (N).
    pub collection_size: u64,
    /// IDF shift for initial-term weighting.
    pub param_weight1: f64,
    /// IDF shift for expansion-term weighting.
    pub param_weight2: f64,
    /// Seed-weight mix for unigrams and bigrams, first and second pass.
    pub param_mix_unigram1: f64,
    pub param_mix_bigram1: f64,
    pub param_mix_unigram2: f64,
    pub param_mix_bigram2: f64,
    /// Scale dampening.
    pub param_scale1: f64,
    pub param_scale2: f64,
    /// Bounds on the number of selected expansion terms.
    pub min_term2: usize,
    pub max_term2: usize,
    /// Rank-merge depths; `max_rank1 == 0` disables the merge.
    pub max_rank1: usize,
    pub max_rank2: usize,
    /// Rank mix; the expanded rank weighs this much.
    pub param_mix_rank: f64,
}

impl Default for ExpandParameters {
    fn default() -> Self {
        Self {
            collection_size: 0,
            param_weight1: 0.2,
            param_weight2: 0.2,
            param_mix_unigram1: 0.5,
            param_mix_bigram1: 0.5,
            param_mix_unigram2: 0.5,
            param_mix_bigram2: 0.5,
            param_scale1: 1.0,
            param_scale2: 1.0,
            min_term2: 5,
            max_term2: 20,
            max_rank1: 0,
            max_rank2: 2000,
            param_mix_rank: 0.6,
        }
    }
}

pub struct TermExpander {
    parameters: ExpandParameters,
}

impl TermExpander {
    pub fn new(parameters: ExpandParameters) -> TermExpander {
        TermExpander { parameters }
    }

    pub fn parameters(&self) -> &ExpandParameters {
        &self.parameters
    }

    /// Build the initial term pool from the query text.
    pub fn make_pool(&self, blocker: &dyn Blocker, query: &str, max_size: usize) -> TermPool {
        let mut pool = TermPool::new(max_size);
        for token in blocker.tokenize(query) {
            let mut term = TermElement::new(token.string);
            term.position = token.position;
            term.is_bigram = token.is_bigram;
            term.tsv = 1.0;
            pool.insert_term(term);
        }
        pool
    }

    /// Feed one seed document into the term map.
    pub fn populate_map(
        &self,
        map: &mut TermMap,
        blocker: &dyn Blocker,
        doc_id: DocumentId,
        text: &str,
    ) {
        for token in blocker.tokenize(text) {
            let mut term = TermElement::new(token.string);
            term.is_bigram = token.is_bigram;
            map.insert_term(doc_id, &term);
        }
    }

    /// Weight the initial terms against the seed documents.
    ///
    /// Each term mixes its collection weight with its seed weight and gets
    /// a selection value `weight * (r/R - n/N)`, clamped at zero. Terms are
    /// consumed from the map; the map's confidence becomes the mean
    /// selection value.
    pub fn weight_term(&self, map: &mut TermMap, pool: &mut TermPool) {
        let r_total = map.num_docs() as f64;
        let n_total = self.parameters.collection_size as f64;
        if r_total == 0.0 || n_total == 0.0 {
            return;
        }
        let alpha = self.parameters.param_weight1;
        let max_weight1 = (alpha * n_total + 1.0).ln();
        let max_weight2 = (((r_total + 0.5) / 0.5) / (0.5 / n_total)).ln();
        if max_weight1 <= 0.0 || max_weight2 <= 0.0 {
            return;
        }

        for term in pool.iter_mut() {
            let n = term.df;
            if n == 0.0 {
                term.tsv = 0.0;
                continue;
            }
            term.param_weight = alpha;

            // Seed frequency and average seed term frequency.
            let mut r = 0.5;
            let mut tf = 0.5;
            if let Some(posting) = map.find(&term.string) {
                r = posting.len() as f64;
                tf += posting.iter().map(|(_, f)| *f as f64).sum::<f64>();
                tf /= r;
            }
            map.erase(&term.string);
            term.sdf = r;
            term.tf = tf;

            let weight = mix_weights(
                alpha,
                n_total,
                r_total,
                n,
                r,
                max_weight1,
                max_weight2,
                if term.is_bigram {
                    self.parameters.param_mix_bigram1
                } else {
                    self.parameters.param_mix_unigram1
                },
            );
            term.weight = weight;
            term.tsv = (weight * (r / r_total - n / n_total)).max(0.0);
            term.scale = term.twv * term.tf / (term.tf + self.parameters.param_scale1);
        }

        // Confidence: mean selection value of the weighted pool.
        let mut total = 0.0;
        let mut count = 0usize;
        for term in pool.iter() {
            total += term.tsv;
            count += 1;
        }
        map.set_confidence(if count == 0 { 0.0 } else { total / count as f64 });
    }

    /// Select expansion terms from the candidates into `pool`. The pool is
    /// resized to `min_term2 + (max_term2 - min_term2) * confidence`.
    pub fn select_term(&self, map: &TermMap, candidate: &mut TermPool, pool: &mut TermPool) {
        let r_total = map.num_docs() as f64;
        let n_total = self.parameters.collection_size as f64;
        if r_total == 0.0 || n_total == 0.0 {
            return;
        }
        if self.parameters.max_term2 > self.parameters.min_term2 {
            let selected = self.parameters.min_term2
                + ((self.parameters.max_term2 - self.parameters.min_term2) as f64
                    * map.confidence()) as usize;
            pool.resize(selected);
        }

        let alpha = self.parameters.param_weight2;
        let max_weight1 = (alpha * n_total + 1.0).ln();
        let max_weight2 = (((r_total + 0.5) / 0.5) / (0.5 / n_total)).ln();
        if max_weight1 <= 0.0 || max_weight2 <= 0.0 {
            return;
        }

        for term in candidate.iter_mut() {
            let n = term.df;
            if n == 0.0 {
                term.tsv = 0.0;
                continue;
            }
            let r = term.sdf;
            let weight = mix_weights(
                alpha,
                n_total,
                r_total,
                n,
                r,
                max_weight1,
                max_weight2,
                if term.is_bigram {
                    self.parameters.param_mix_bigram2
                } else {
                    self.parameters.param_mix_unigram2
                },
            );
            term.weight = weight;
            term.tsv = (weight * (r / r_total - n / n_total)).max(0.0);
        }
        for term in candidate.iter() {
            pool.insert_term(term.clone());
        }

        for term in pool.iter_mut() {
            term.param_weight = alpha;
            term.scale = term.twv * term.tf / (term.tf + self.parameters.param_scale2);
        }
        pool.sort_by_tsv();
    }

    /// Merge the expanded results with the initial ones in rank space: the
    /// final score is `1 / (beta * rank2 + (1 - beta) * rank1)`, where an
    /// absent initial rank counts as `max_rank1 + 1`. A zero `max_rank1`
    /// disables the merge.
    pub fn merge_rank(&self, initial: &RankedResult, expanded: &mut RankedResult) {
        if self.parameters.max_rank1 == 0 {
            return;
        }
        let beta = self.parameters.param_mix_rank;
        let mut initial_rank = std::collections::HashMap::new();
        for (rank, (doc_id, _)) in initial.iter().take(self.parameters.max_rank1).enumerate() {
            initial_rank.insert(*doc_id, rank + 1);
        }
        expanded.truncate(self.parameters.max_rank2);
        for (rank2_zero, (doc_id, score)) in expanded.iter_mut().enumerate() {
            let rank2 = rank2_zero + 1;
            let rank1 = initial_rank
                .get(doc_id)
                .copied()
                .unwrap_or(self.parameters.max_rank1 + 1);
            *score = 1.0 / (beta * rank2 as f64 + (1.0 - beta) * rank1 as f64);
        }
        expanded.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    }
}

/// The two feedback weights and their mix: `w1` from the collection,
/// `w2` from the seed split, both normalized and clamped at zero.
#[allow(clippy::too_many_arguments)]
fn mix_weights(
    alpha: f64,
    n_total: f64,
    r_total: f64,
    n: f64,
    r: f64,
    max_weight1: f64,
    max_weight2: f64,
    mix: f64,
) -> f64 {
    let w1 = (((alpha * n_total) / n + 1.0).ln() / max_weight1).max(0.0);
    // Documents outside the seed set holding / not holding the term; the
    // seed set may not be drawn from the collection, so clamp both.
    let holding = (n - r).max(0.0);
    let missing = (n_total - n - r_total + r).max(0.0);
    let w2 = ((((r + 0.5) / (r_total - r + 0.5)) / ((holding + 0.5) / (missing + 0.5))).ln()
        / max_weight2)
        .max(0.0);
    (1.0 - mix) * w1 + mix * w2
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::blocker::JapaneseBlocker;

    fn expander(n: u64) -> TermExpander {
        TermExpander::new(ExpandParameters {
            collection_size: n,
            ..ExpandParameters::default()
        })
    }

    #[test]
    fn weights_match_formula() {
        // N=1000, R=5, alpha=0.2; a term with n=10, r=4.
        let expander = expander(1000);
        let blocker = JapaneseBlocker::new(false);
        let mut pool = expander.make_pool(&blocker, "widget", 8);
        pool.iter_mut().next().unwrap().df = 10.0;

        let mut map = TermMap::new();
        for doc in 1..=5u32 {
            if doc <= 4 {
                expander.populate_map(&mut map, &blocker, doc, "widget");
            } else {
                expander.populate_map(&mut map, &blocker, doc, "other");
            }
        }
        expander.weight_term(&mut map, &mut pool);

        let term = pool.get("widget").unwrap();
        let w1 = ((0.2f64 * 1000.0 / 10.0) + 1.0).ln() / (0.2f64 * 1000.0 + 1.0).ln();
        let w2 = (((4.5f64) / 1.5) / (6.5 / 989.5)).ln()
            / (((5.5f64) / 0.5) / (0.5 / 1000.0)).ln();
        let expected_weight = 0.5 * w1 + 0.5 * w2;
        assert!((term.weight - expected_weight).abs() < 1e-9);
        let expected_tsv = expected_weight * (4.0 / 5.0 - 10.0 / 1000.0);
        assert!((term.tsv - expected_tsv).abs() < 1e-9);
        assert_eq!(term.sdf, 4.0);
    }

    #[test]
    fn zero_df_term_gets_zero_tsv() {
        let expander = expander(100);
        let blocker = JapaneseBlocker::new(false);
        let mut pool = expander.make_pool(&blocker, "ghost", 4);
        let mut map = TermMap::new();
        expander.populate_map(&mut map, &blocker, 1, "ghost");
        expander.weight_term(&mut map, &mut pool);
        assert_eq!(pool.get("ghost").unwrap().tsv, 0.0);
    }

    #[test]
    fn select_term_caps_by_confidence() {
        let expander = TermExpander::new(ExpandParameters {
            collection_size: 1000,
            min_term2: 1,
            max_term2: 5,
            ..ExpandParameters::default()
        });
        let mut map = TermMap::new();
        let blocker = JapaneseBlocker::new(false);
        for doc in 1..=3u32 {
            expander.populate_map(&mut map, &blocker, doc, "shared words here");
        }
        map.set_confidence(0.5);

        let mut candidate = TermPool::new(16);
        for (name, df, sdf) in [("shared", 10.0, 3.0), ("words", 50.0, 3.0), ("here", 500.0, 1.0)] {
            let mut t = TermElement::new(name);
            t.df = df;
            t.sdf = sdf;
            candidate.insert_term(t);
        }
        let mut pool = TermPool::new(16);
        expander.select_term(&map, &mut candidate, &mut pool);
        // 1 + (5-1)*0.5 = 3 terms at most.
        assert!(pool.len() <= 3);
        // Rarer-in-collection, common-in-seed terms rank first.
        assert_eq!(pool.iter().next().unwrap().string, "shared");
    }

    #[test]
    fn merge_rank_blends_both_rankings() {
        let expander = TermExpander::new(ExpandParameters {
            max_rank1: 10,
            max_rank2: 10,
            param_mix_rank: 0.6,
            ..ExpandParameters::default()
        });
        let initial: RankedResult = vec![(1, 0.9), (2, 0.8), (3, 0.7)];
        let mut expanded: RankedResult = vec![(2, 0.95), (9, 0.5)];
        expander.merge_rank(&initial, &mut expanded);
        // doc 2: rank2=1, rank1=2 -> 1/(0.6 + 0.8) ; doc 9: rank2=2,
        // rank1=11 -> 1/(1.2 + 4.4).
        assert_eq!(expanded[0].0, 2);
        assert!((expanded[0].1 - 1.0 / 1.4).abs() < 1e-12);
        assert!((expanded[1].1 - 1.0 / 5.6).abs() < 1e-12);
    }

    #[test]
    fn merge_rank_disabled_without_depth() {
        let expander = TermExpander::new(ExpandParameters::default());
        let initial: RankedResult = vec![(1, 0.9)];
        let mut expanded: RankedResult = vec![(2, 0.5)];
        expander.merge_rank(&initial, &mut expanded);
        assert_eq!(expanded, vec![(2, 0.5)]);
    }
}
