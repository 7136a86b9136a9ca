// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Subcommands, in the order they are usually run:
//
//   split    raw JSONL → train.json / val.json
//   vocab    dataset   → vocab.json
//   stats    token length histogram for choosing max_length
//   inspect  parameter count for a set of hyperparameters
//   train    the training loop
//
// clap's derive macros generate help text, error messages for
// missing args and type conversion.

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{BackendKind, TrainConfig};
use crate::ml::model::GptConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the GPT model on question/answer pairs
    Train(TrainArgs),

    /// Build the character vocabulary from a JSONL dataset
    Vocab(VocabArgs),

    /// Shuffle a JSONL dataset and split it into train.json and val.json
    Split(SplitArgs),

    /// Print a histogram of encoded sequence lengths
    Stats(StatsArgs),

    /// Print the parameter count of a model configuration
    Inspect(InspectArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Cpu,
    Gpu,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Cpu => BackendKind::Cpu,
            BackendArg::Gpu => BackendKind::Gpu,
        }
    }
}

/// Architecture flags shared by `train` and `inspect`.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Number of stacked decoder layers
    #[arg(long, default_value_t = 6)]
    pub n_layers: usize,

    /// Attention heads per layer; n_heads * d_k must equal d_model
    #[arg(long, default_value_t = 12)]
    pub n_heads: usize,

    /// Width of every hidden state
    #[arg(long, default_value_t = 768)]
    pub d_model: usize,

    /// Inner width of the feed-forward sublayer
    #[arg(long, default_value_t = 2048)]
    pub d_ff: usize,

    /// Per-head query/key width
    #[arg(long, default_value_t = 64)]
    pub d_k: usize,

    /// Per-head value width
    #[arg(long, default_value_t = 64)]
    pub d_v: usize,

    /// Rows in the positional table; must be at least max_length - 1
    #[arg(long, default_value_t = 1800)]
    pub max_pos: usize,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "data/train.json")]
    pub train_path: String,

    #[arg(long, default_value = "data/val.json")]
    pub val_path: String,

    #[arg(long, default_value = "data/vocab.json")]
    pub vocab_path: String,

    /// Where best.mpk, last.mpk and model_config.json are written
    #[arg(long, default_value = "output")]
    pub model_output_dir: String,

    /// Where scalars.csv is appended to
    #[arg(long, default_value = "logs")]
    pub logs_dir: String,

    /// Encoded length (question + answer + separators + padding)
    #[arg(long, default_value_t = 120)]
    pub max_length: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub learning_rate: f64,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Data loader worker threads
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Seeds weight init and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// NdArray on the CPU, or WGPU when a GPU adapter is available
    #[arg(long, value_enum, default_value_t = BackendArg::Cpu)]
    pub backend: BackendArg,

    /// Continue from last.mpk in the output directory
    #[arg(long)]
    pub resume: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:       a.train_path,
            val_path:         a.val_path,
            vocab_path:       a.vocab_path,
            model_output_dir: a.model_output_dir,
            logs_dir:         a.logs_dir,
            max_length:       a.max_length,
            epochs:           a.epochs,
            batch_size:       a.batch_size,
            learning_rate:    a.learning_rate,
            n_layers:         a.model.n_layers,
            n_heads:          a.model.n_heads,
            d_model:          a.model.d_model,
            d_ff:             a.model.d_ff,
            d_k:              a.model.d_k,
            d_v:              a.model.d_v,
            max_pos:          a.model.max_pos,
            num_workers:      a.num_workers,
            seed:             a.seed,
            backend:          a.backend.into(),
            resume:           a.resume,
        }
    }
}

#[derive(Args, Debug)]
pub struct VocabArgs {
    /// JSONL file to collect characters from
    #[arg(long, default_value = "data/train.jsonl")]
    pub input: String,

    #[arg(long, default_value = "data/vocab.json")]
    pub output: String,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[arg(long, default_value = "data/train.jsonl")]
    pub input: String,

    #[arg(long, default_value = "data")]
    pub output_dir: String,

    /// Share of records that go to train.json
    #[arg(long, default_value_t = 0.985)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(long, default_value = "data/train.json")]
    pub input: String,

    #[arg(long, default_value = "data/vocab.json")]
    pub vocab_path: String,

    /// Bucket width in tokens
    #[arg(long, default_value_t = 50)]
    pub interval: usize,

    /// Also print this many records as they look after encoding
    #[arg(long, default_value_t = 0)]
    pub show: usize,

    /// Sequence length used for --show
    #[arg(long, default_value_t = 120)]
    pub max_length: usize,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Vocabulary whose size sets the embedding and output widths
    #[arg(long, default_value = "data/vocab.json")]
    pub vocab_path: String,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl ModelArgs {
    pub fn to_config(&self, vocab_size: usize) -> GptConfig {
        GptConfig {
            vocab_size,
            max_pos:  self.max_pos,
            d_model:  self.d_model,
            n_heads:  self.n_heads,
            d_k:      self.d_k,
            d_v:      self.d_v,
            d_ff:     self.d_ff,
            n_layers: self.n_layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["char-gpt-qa", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();
        assert_eq!(cfg.max_length, def.max_length);
        assert_eq!(cfg.d_model, def.d_model);
        assert_eq!(cfg.n_heads, def.n_heads);
        assert_eq!(cfg.max_pos, def.max_pos);
        assert_eq!(cfg.backend, def.backend);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_train_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "char-gpt-qa", "train", "--backend", "gpu", "--epochs", "3", "--d-model", "64",
            "--n-heads", "4", "--d-k", "16", "--d-v", "16", "--resume",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.backend, BackendKind::Gpu);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.d_model, 64);
        assert!(cfg.resume);
    }

    #[test]
    fn test_backend_defaults_to_cpu() {
        let cli = Cli::try_parse_from(["char-gpt-qa", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(TrainConfig::from(args).backend, BackendKind::Cpu);
    }

    #[test]
    fn test_stats_show_flags() {
        let cli = Cli::try_parse_from(["char-gpt-qa", "stats", "--show", "3", "--max-length", "16"])
            .unwrap();
        let Commands::Stats(args) = cli.command else { panic!("expected stats") };
        assert_eq!(args.show, 3);
        assert_eq!(args.max_length, 16);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["char-gpt-qa", "train", "--backend", "tpu"]).is_err());
    }
}
