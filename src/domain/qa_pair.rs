// ============================================================
// Layer 3 — QaPair Domain Type
// ============================================================
// One training example: a question and its answer, both as raw
// text. The model never sees this struct directly; the
// tokenizer turns it into
//
//   question chars <sep> answer chars <sep> <pad> ...
//
// and the dataset shifts that sequence by one to form
// (input, label) pairs for next-token prediction.

use serde::{Deserialize, Serialize};

/// A question/answer pair exactly as stored in the JSONL dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    /// The natural language question
    pub question: String,

    /// The reference answer the model learns to continue with
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer:   answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_from_json_line() {
        let line = r#"{"question": "你好吗", "answer": "ok", "extra": 1}"#;
        let pair: QaPair = serde_json::from_str(line).unwrap();
        assert_eq!(pair, QaPair::new("你好吗", "ok"));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let line = r#"{"question": "only a question"}"#;
        assert!(serde_json::from_str::<QaPair>(line).is_err());
    }
}
