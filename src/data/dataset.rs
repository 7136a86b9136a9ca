use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::qa_pair::QaPair;
use crate::infra::tokenizer_store::CharTokenizer;

/// One tokenised next-token-prediction sample.
///
/// The encoded sequence `e` of length `max_length` becomes
/// `input_ids = e[..n-1]`, `labels = e[1..]`, so every position is
/// trained to predict the token that follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<u32>,
}

impl QaSample {
    pub fn from_pair(pair: &QaPair, tokenizer: &CharTokenizer, max_length: usize) -> Self {
        let (ids, mask) = tokenizer.encode(&pair.question, &pair.answer, max_length, true);
        let n = ids.len();
        Self {
            input_ids:      ids[..n - 1].to_vec(),
            attention_mask: mask[..n - 1].to_vec(),
            labels:         ids[1..].to_vec(),
        }
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.len()
    }
}

/// Records are kept as text and encoded lazily in `get`, which runs
/// on the data loader's worker threads.
pub struct QaDataset {
    records:    Vec<QaPair>,
    tokenizer:  CharTokenizer,
    max_length: usize,
}

impl QaDataset {
    /// # Panics
    /// Panics if `max_length < 2`: shifting needs at least two tokens.
    pub fn new(records: Vec<QaPair>, tokenizer: CharTokenizer, max_length: usize) -> Self {
        assert!(max_length >= 2, "max_length must be at least 2, got {max_length}");
        tracing::info!("Dataset ready: {} records, max_length={}", records.len(), max_length);
        Self { records, tokenizer, max_length }
    }
}

impl Dataset<QaSample> for QaDataset {
    fn get(&self, index: usize) -> Option<QaSample> {
        self.records
            .get(index)
            .map(|pair| QaSample::from_pair(pair, &self.tokenizer, self.max_length))
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_shifted_by_one() {
        let pair = QaPair::new("a", "b");
        let tok  = CharTokenizer::build(&[pair.clone()]);
        // encoded: [3, 2, 4, 2, 0, 0]
        let s = QaSample::from_pair(&pair, &tok, 6);
        assert_eq!(s.input_ids,      vec![3, 2, 4, 2, 0]);
        assert_eq!(s.attention_mask, vec![1, 1, 1, 1, 0]);
        assert_eq!(s.labels,         vec![2, 4, 2, 0, 0]);
        assert_eq!(s.seq_len(), 5);
    }

    #[test]
    fn test_dataset_get_and_len() {
        let pairs = vec![QaPair::new("a", "b"), QaPair::new("b", "a")];
        let tok   = CharTokenizer::build(&pairs);
        let ds    = QaDataset::new(pairs, tok, 4);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(1).unwrap().input_ids, vec![4, 2, 3]);
        assert!(ds.get(2).is_none());
    }
}
