// ============================================================
// Layer 4 — Token Length Statistics
// ============================================================
// Encodes every record without padding and buckets the sequence
// lengths into fixed-width intervals. Used to pick a max_length
// that keeps most samples untruncated.

use crate::domain::qa_pair::QaPair;
use crate::infra::tokenizer_store::CharTokenizer;

/// One histogram bucket covering `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthBucket {
    pub lower: usize,
    pub upper: usize,
    pub count: usize,
}

/// Unpadded encoded length of every record (separators included).
pub fn token_lengths(records: &[QaPair], tokenizer: &CharTokenizer) -> Vec<usize> {
    records
        .iter()
        .map(|r| tokenizer.encode(&r.question, &r.answer, 0, false).0.len())
        .collect()
}

/// Bucket `lengths` into `[0, interval), [interval, 2*interval), ...`
/// up to and including the bucket that holds the maximum.
///
/// # Panics
/// Panics if `interval` is zero.
pub fn length_histogram(lengths: &[usize], interval: usize) -> Vec<LengthBucket> {
    assert!(interval > 0, "interval must be positive");
    let Some(&max) = lengths.iter().max() else {
        return Vec::new();
    };

    let mut buckets: Vec<LengthBucket> = (0..=max / interval)
        .map(|i| LengthBucket { lower: i * interval, upper: (i + 1) * interval, count: 0 })
        .collect();
    for &len in lengths {
        buckets[len / interval].count += 1;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let h = length_histogram(&[1, 49, 50, 120], 50);
        assert_eq!(h.len(), 3);
        assert_eq!(h[0], LengthBucket { lower: 0,   upper: 50,  count: 2 });
        assert_eq!(h[1], LengthBucket { lower: 50,  upper: 100, count: 1 });
        assert_eq!(h[2], LengthBucket { lower: 100, upper: 150, count: 1 });
    }

    #[test]
    fn test_empty_histogram() {
        assert!(length_histogram(&[], 10).is_empty());
    }

    #[test]
    fn test_token_lengths_include_separators() {
        let pairs = vec![QaPair::new("ab", "a")];
        let tok   = CharTokenizer::build(&pairs);
        assert_eq!(token_lengths(&pairs, &tok), vec![5]);
    }
}
