// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Typed failures the lower layers can report. The application
// and CLI layers wrap these into anyhow::Error with context.
//
// Numeric instability (NaN / exploding loss) is deliberately
// absent: it is mitigated by gradient clipping, not detected.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GptError {
    /// Inconsistent hyperparameters, or a sequence that does not
    /// fit the positional table. Always raised before any
    /// parameter update happens.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A dataset line that is not a valid {question, answer} record.
    #[error("malformed record in '{path}' at line {line}: {reason}")]
    DataFormat {
        path:   String,
        line:   usize,
        reason: String,
    },

    /// A vocabulary file that is unreadable or self-contradictory.
    #[error("vocabulary error: {0}")]
    Vocab(String),
}

impl GptError {
    pub fn config(msg: impl Into<String>) -> Self {
        GptError::Configuration(msg.into())
    }
}

pub type GptResult<T> = std::result::Result<T, GptError>;
