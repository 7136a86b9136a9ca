// ============================================================
// Layer 6 — Character Tokenizer and Vocabulary Store
// ============================================================
// Every distinct character seen in the corpus is one token.
// Three ids are reserved and always occupy the first slots:
//
//   0  <pad>  padding, ignored by the loss
//   1  <unk>  any character missing from the vocabulary
//   2  <sep>  separator after the question and after the answer
//
// The vocabulary is persisted as
//
//   { "word2id": { "<pad>": 0, "<unk>": 1, "<sep>": 2, "a": 3, ... },
//     "id2word": ["<pad>", "<unk>", "<sep>", "a", ...] }
//
// which is also the format produced by the `vocab` command.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{GptError, GptResult};
use crate::domain::qa_pair::QaPair;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const SEP_TOKEN: &str = "<sep>";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const SEP_ID: u32 = 2;

/// On-disk vocabulary layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocab {
    pub word2id: HashMap<String, u32>,
    pub id2word: Vec<String>,
}

/// Character-level tokenizer over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    word2id: HashMap<char, u32>,
    id2word: Vec<String>,
}

impl CharTokenizer {
    /// Build a vocabulary from every character of every (trimmed)
    /// question and answer. Characters are sorted so the same corpus
    /// always yields the same ids.
    pub fn build(records: &[QaPair]) -> Self {
        let chars: BTreeSet<char> = records
            .iter()
            .flat_map(|r| [r.question.trim(), r.answer.trim()])
            .flat_map(str::chars)
            .collect();

        let mut id2word: Vec<String> = vec![
            PAD_TOKEN.to_string(),
            UNK_TOKEN.to_string(),
            SEP_TOKEN.to_string(),
        ];
        let mut word2id = HashMap::with_capacity(chars.len());
        for c in chars {
            word2id.insert(c, id2word.len() as u32);
            id2word.push(c.to_string());
        }

        Self { word2id, id2word }
    }

    /// Validate a deserialised vocabulary and turn it into a tokenizer.
    pub fn from_vocab(vocab: Vocab) -> GptResult<Self> {
        for (token, id) in [(PAD_TOKEN, PAD_ID), (UNK_TOKEN, UNK_ID), (SEP_TOKEN, SEP_ID)] {
            if vocab.word2id.get(token) != Some(&id) {
                return Err(GptError::Vocab(format!("'{token}' must have id {id}")));
            }
        }

        let mut word2id = HashMap::with_capacity(vocab.word2id.len());
        for (word, &id) in &vocab.word2id {
            if vocab.id2word.get(id as usize).map(String::as_str) != Some(word.as_str()) {
                return Err(GptError::Vocab(format!(
                    "word2id['{word}'] = {id} disagrees with id2word"
                )));
            }
            if [PAD_TOKEN, UNK_TOKEN, SEP_TOKEN].contains(&word.as_str()) {
                continue;
            }
            let mut it = word.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => {
                    word2id.insert(c, id);
                }
                _ => {
                    return Err(GptError::Vocab(format!(
                        "entry '{word}' is not a single character"
                    )))
                }
            }
        }

        Ok(Self { word2id, id2word: vocab.id2word })
    }

    pub fn to_vocab(&self) -> Vocab {
        let word2id = self
            .id2word
            .iter()
            .enumerate()
            .map(|(id, w)| (w.clone(), id as u32))
            .collect();
        Vocab { word2id, id2word: self.id2word.clone() }
    }

    pub fn vocab_size(&self) -> usize {
        self.id2word.len()
    }

    fn char_ids<'a>(&'a self, text: &'a str) -> impl Iterator<Item = u32> + 'a {
        text.chars()
            .map(|c| self.word2id.get(&c).copied().unwrap_or(UNK_ID))
    }

    /// Encode a question/answer pair.
    ///
    /// Layout: `question <sep> answer <sep>`. When `pad_to_max_length`
    /// is set the result is truncated or right-padded to exactly
    /// `max_length`; the mask is 1 for real tokens and 0 for padding.
    pub fn encode(
        &self,
        question:          &str,
        answer:            &str,
        max_length:        usize,
        pad_to_max_length: bool,
    ) -> (Vec<u32>, Vec<u32>) {
        let mut ids: Vec<u32> = self.char_ids(question).collect();
        ids.push(SEP_ID);
        ids.extend(self.char_ids(answer));
        ids.push(SEP_ID);

        let mut mask = vec![1u32; ids.len()];

        if pad_to_max_length {
            ids.truncate(max_length);
            mask.truncate(max_length);
            ids.resize(max_length, PAD_ID);
            mask.resize(max_length, 0);
        }

        (ids, mask)
    }

    /// Map ids back to text. Reserved tokens are dropped.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter(|&&id| id > SEP_ID)
            .filter_map(|&id| self.id2word.get(id as usize))
            .map(String::as_str)
            .collect()
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
/// Reads and writes the vocabulary JSON file.
pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load a previously saved vocabulary
    pub fn load(&self) -> Result<CharTokenizer> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read vocabulary '{}'", self.path.display()))?;
        let vocab: Vocab = serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse vocabulary '{}'", self.path.display()))?;
        let tokenizer = CharTokenizer::from_vocab(vocab)?;
        tracing::info!(
            "Loaded vocabulary with {} tokens from '{}'",
            tokenizer.vocab_size(),
            self.path.display()
        );
        Ok(tokenizer)
    }

    /// Write the vocabulary as JSON (non-ASCII characters kept verbatim).
    pub fn save(&self, tokenizer: &CharTokenizer) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&tokenizer.to_vocab())?;
        fs::write(&self.path, json)
            .with_context(|| format!("Cannot write vocabulary '{}'", self.path.display()))?;
        tracing::info!(
            "Vocabulary with {} tokens saved to '{}'",
            tokenizer.vocab_size(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_tokenizer() -> CharTokenizer {
        CharTokenizer::build(&[QaPair::new("a", "b")])
    }

    #[test]
    fn test_reserved_ids_come_first() {
        let tok = ab_tokenizer();
        assert_eq!(tok.vocab_size(), 5);
        let vocab = tok.to_vocab();
        assert_eq!(vocab.id2word, vec!["<pad>", "<unk>", "<sep>", "a", "b"]);
        assert_eq!(vocab.word2id["b"], 4);
    }

    #[test]
    fn test_encode_pads_and_masks() {
        let tok = ab_tokenizer();
        let (ids, mask) = tok.encode("a", "b", 6, true);
        assert_eq!(ids,  vec![3, 2, 4, 2, 0, 0]);
        assert_eq!(mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_encode_truncates() {
        let tok = ab_tokenizer();
        let (ids, mask) = tok.encode("aaaa", "b", 3, true);
        assert_eq!(ids,  vec![3, 3, 3]);
        assert_eq!(mask, vec![1, 1, 1]);
    }

    #[test]
    fn test_unknown_chars_map_to_unk() {
        let tok = ab_tokenizer();
        let (ids, _) = tok.encode("z", "", 0, false);
        assert_eq!(ids, vec![UNK_ID, SEP_ID, SEP_ID]);
    }

    #[test]
    fn test_decode_skips_reserved() {
        let tok = ab_tokenizer();
        assert_eq!(tok.decode(&[3, 2, 4, 2, 0, 1]), "ab");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path().join("vocab.json"));
        let tok   = CharTokenizer::build(&[QaPair::new("什么", "是")]);
        store.save(&tok).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.vocab_size(), tok.vocab_size());
        assert_eq!(loaded.encode("什么", "是", 8, true), tok.encode("什么", "是", 8, true));
    }

    #[test]
    fn test_rejects_vocab_without_reserved_tokens() {
        let vocab = Vocab {
            word2id: HashMap::from([("a".to_string(), 0)]),
            id2word: vec!["a".to_string()],
        };
        assert!(matches!(CharTokenizer::from_vocab(vocab), Err(GptError::Vocab(_))));
    }
}
