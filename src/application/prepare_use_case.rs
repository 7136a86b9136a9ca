// ============================================================
// Layer 2 — Dataset Preparation Use Cases
// ============================================================
// The steps that run once before training:
//
//   split   raw.jsonl          → train.json + val.json
//   vocab   train.jsonl        → vocab.json
//   stats   train.json + vocab → token length histogram
//                                 (+ decoded samples with --show)
//   inspect hyperparameters    → parameter count + attention shapes
//
// Each is a plain function returning what it produced so the
// CLI layer decides how to print it.

use anyhow::{Context, Result};
use burn::{backend::NdArray, prelude::*};
use std::{fs, path::Path};

use crate::data::{
    loader::JsonlLoader,
    splitter::split_train_val,
    stats::{length_histogram, token_lengths, LengthBucket},
};
use crate::domain::traits::RecordSource;
use crate::infra::tokenizer_store::{CharTokenizer, TokenizerStore, SEP_ID};
use crate::ml::model::GptConfig;

/// Line counts written by [`split_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCounts {
    pub total: usize,
    pub train: usize,
    pub val:   usize,
}

/// What `inspect` found out about a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReport {
    pub num_params: usize,

    /// `[batch, n_heads, L, L]` of each layer's attention weights for a
    /// one-sequence forward pass
    pub attention_shapes: Vec<[usize; 4]>,
}

/// Build a character vocabulary from `dataset` and write it to `vocab_path`.
///
/// Returns the vocabulary size, reserved tokens included.
pub fn build_vocab(dataset: impl AsRef<Path>, vocab_path: impl AsRef<Path>) -> Result<usize> {
    let records   = JsonlLoader::new(dataset).load_all()?;
    let tokenizer = CharTokenizer::build(&records);
    TokenizerStore::new(vocab_path).save(&tokenizer)?;
    Ok(tokenizer.vocab_size())
}

/// Shuffle the non-blank lines of `input` with `seed` and write the
/// first `train_fraction` of them to `{output_dir}/train.json`, the
/// rest to `{output_dir}/val.json`. Lines are copied byte for byte.
pub fn split_dataset(
    input:          impl AsRef<Path>,
    output_dir:     impl AsRef<Path>,
    train_fraction: f64,
    seed:           u64,
) -> Result<SplitCounts> {
    let lines      = JsonlLoader::new(input).raw_lines()?;
    let total      = lines.len();
    let (train, val) = split_train_val(lines, train_fraction, seed);

    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create '{}'", output_dir.display()))?;
    write_lines(&output_dir.join("train.json"), &train)?;
    write_lines(&output_dir.join("val.json"), &val)?;

    tracing::info!("Split {} records: {} train, {} validation", total, train.len(), val.len());
    Ok(SplitCounts { total, train: train.len(), val: val.len() })
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut text = lines.join("\n");
    if !lines.is_empty() {
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("Cannot write '{}'", path.display()))
}

/// Histogram of unpadded encoded lengths, `interval` tokens per bucket.
pub fn token_stats(
    dataset:    impl AsRef<Path>,
    vocab_path: impl AsRef<Path>,
    interval:   usize,
) -> Result<Vec<LengthBucket>> {
    anyhow::ensure!(interval > 0, "interval must be positive");
    let tokenizer = TokenizerStore::new(vocab_path).load()?;
    let records   = JsonlLoader::new(dataset).load_all()?;
    Ok(length_histogram(&token_lengths(&records, &tokenizer), interval))
}

/// The first `count` records as the model sees them: encoded, cut or
/// padded to `max_length`, then decoded back to text. Separators,
/// padding and characters missing from the vocabulary disappear.
pub fn preview_samples(
    dataset:    impl AsRef<Path>,
    vocab_path: impl AsRef<Path>,
    max_length: usize,
    count:      usize,
) -> Result<Vec<String>> {
    let tokenizer = TokenizerStore::new(vocab_path).load()?;
    let records   = JsonlLoader::new(dataset).load_all()?;
    Ok(records
        .iter()
        .take(count)
        .map(|r| tokenizer.decode(&tokenizer.encode(&r.question, &r.answer, max_length, true).0))
        .collect())
}

/// Validate `cfg`, count its parameters and run one short sequence
/// through a freshly initialised copy on the CPU.
pub fn inspect_model(cfg: &GptConfig) -> Result<ModelReport> {
    cfg.validate()?;
    let device = Default::default();
    let model  = cfg.init::<NdArray>(&device)?;

    let len = cfg.max_pos.min(8);
    let ids = Tensor::<NdArray, 2, Int>::full([1, len], SEP_ID as i32, &device);
    let out = model.forward(ids, None)?;

    Ok(ModelReport {
        num_params:       cfg.num_params(),
        attention_shapes: out.attentions.iter().map(|a| a.dims()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = concat!(
        "{\"question\":\"ab\",\"answer\":\"c\"}\n",
        "\n",
        "{\"question\":\"b\",\"answer\":\"abc\"}\n",
        "{\"question\":\"c\",\"answer\":\"a\"}\n",
        "{\"question\":\"a\",\"answer\":\"b\"}\n",
    );

    fn dataset(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("raw.jsonl");
        fs::write(&path, RECORDS).unwrap();
        path
    }

    #[test]
    fn test_build_vocab_writes_file() {
        let dir   = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("data").join("vocab.json");
        let size  = build_vocab(dataset(dir.path()), &vocab).unwrap();
        assert_eq!(size, 3 + 3);
        assert_eq!(TokenizerStore::new(&vocab).load().unwrap().vocab_size(), 6);
    }

    #[test]
    fn test_split_dataset_writes_both_files() {
        let dir    = tempfile::tempdir().unwrap();
        let out    = dir.path().join("split");
        let counts = split_dataset(dataset(dir.path()), &out, 0.75, 1).unwrap();
        assert_eq!(counts, SplitCounts { total: 4, train: 3, val: 1 });

        let train = JsonlLoader::new(out.join("train.json")).load_all().unwrap();
        let val   = JsonlLoader::new(out.join("val.json")).load_all().unwrap();
        assert_eq!(train.len(), 3);
        assert_eq!(val.len(), 1);
        assert!(!train.contains(&val[0]));
    }

    #[test]
    fn test_token_stats_histogram() {
        let dir   = tempfile::tempdir().unwrap();
        let data  = dataset(dir.path());
        let vocab = dir.path().join("vocab.json");
        build_vocab(&data, &vocab).unwrap();

        // lengths: 5, 6, 4, 4
        let h = token_stats(&data, &vocab, 5).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].count, 2);
        assert_eq!(h[1].count, 2);
        assert!(token_stats(&data, &vocab, 0).is_err());
    }

    #[test]
    fn test_preview_shows_truncated_text() {
        let dir   = tempfile::tempdir().unwrap();
        let data  = dataset(dir.path());
        let vocab = dir.path().join("vocab.json");
        build_vocab(&data, &vocab).unwrap();

        // "ab<sep>c<sep>" and "b<sep>abc<sep>" cut to three tokens
        let shown = preview_samples(&data, &vocab, 3, 2).unwrap();
        assert_eq!(shown, vec!["ab", "ba"]);

        let all = preview_samples(&data, &vocab, 16, 10).unwrap();
        assert_eq!(all, vec!["abc", "babc", "ca", "ab"]);
    }

    #[test]
    fn test_inspect_rejects_bad_heads() {
        let mut cfg = GptConfig {
            vocab_size: 10,
            max_pos:    8,
            d_model:    8,
            n_heads:    2,
            d_k:        4,
            d_v:        4,
            d_ff:       16,
            n_layers:   1,
        };
        let report = inspect_model(&cfg).unwrap();
        assert!(report.num_params > 0);
        assert_eq!(report.attention_shapes, vec![[1, 2, 8, 8]]);
        cfg.n_heads = 3;
        assert!(inspect_model(&cfg).is_err());
    }
}
