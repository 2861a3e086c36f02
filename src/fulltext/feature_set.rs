// Feature sets: a document's characteristic terms with weights, kept in
// lexical order so inner products walk both sides once. The on-disk form is
// a length-prefixed array of (string, weight) pairs.

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    /// (term, weight), sorted by term.
    features: Vec<(String, f32)>,
}

impl FeatureSet {
    pub fn new(mut features: Vec<(String, f32)>) -> FeatureSet {
        features.sort_by(|a, b| a.0.cmp(&b.0));
        features.dedup_by(|a, b| a.0 == b.0);
        FeatureSet { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, f32)> {
        self.features.iter()
    }

    /// Inner product by a merge walk over the two sorted term lists.
    pub fn inner_product(&self, other: &FeatureSet) -> f64 {
        let mut product = 0.0;
        let mut i = 0;
        let mut j = 0;
        while i < self.features.len() && j < other.features.len() {
            match self.features[i].0.cmp(&other.features[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    product += self.features[i].1 as f64 * other.features[j].1 as f64;
                    i += 1;
                    j += 1;
                }
            }
        }
        product
    }

    /// Serialize: `count u32`, then per feature `len u32`, term bytes, and
    /// the weight.
    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.features.len() as u32).to_le_bytes());
        for (term, weight) in &self.features {
            out.extend_from_slice(&(term.len() as u32).to_le_bytes());
            out.extend_from_slice(term.as_bytes());
            out.extend_from_slice(&weight.to_le_bytes());
        }
        out
    }

    pub fn load(bytes: &[u8]) -> Result<FeatureSet> {
        let corrupt = || DbError::Corruption("truncated feature set".into());
        let mut offset = 0usize;
        let mut take = |n: usize| -> Result<&[u8]> {
            let slice = bytes.get(offset..offset + n).ok_or_else(corrupt)?;
            offset += n;
            Ok(slice)
        };
        let count = u32::from_le_bytes(take(4)?.try_into().unwrap()) as usize;
        let mut features = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let len = u32::from_le_bytes(take(4)?.try_into().unwrap()) as usize;
            let term = std::str::from_utf8(take(len)?)
                .map_err(|_| DbError::Corruption("feature term is not UTF-8".into()))?
                .to_string();
            let weight = f32::from_le_bytes(take(4)?.try_into().unwrap());
            features.push((term, weight));
        }
        Ok(FeatureSet::new(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, f32)]) -> FeatureSet {
        FeatureSet::new(pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect())
    }

    #[test]
    fn inner_product_merges_sorted_terms() {
        let a = set(&[("alpha", 1.0), ("beta", 2.0), ("gamma", 3.0)]);
        let b = set(&[("beta", 4.0), ("delta", 5.0), ("gamma", 0.5)]);
        // beta: 2*4 + gamma: 3*0.5
        assert!((a.inner_product(&b) - 9.5).abs() < 1e-9);
        assert_eq!(a.inner_product(&set(&[])), 0.0);
    }

    #[test]
    fn dump_load_round_trip() {
        let original = set(&[("b", 2.0), ("a", 1.0)]);
        let loaded = FeatureSet::load(&original.dump()).unwrap();
        assert_eq!(loaded, original);
        // Stored in lexical order.
        let terms: Vec<&str> = loaded.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["a", "b"]);
    }

    #[test]
    fn truncated_bytes_are_corrupt() {
        let bytes = set(&[("abc", 1.0)]).dump();
        assert!(FeatureSet::load(&bytes[..bytes.len() - 2]).is_err());
    }
}
