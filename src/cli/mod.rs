// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case. Printing results to the console happens here and
// nowhere below.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, SplitArgs, StatsArgs, TrainArgs, VocabArgs};

use crate::application::{prepare_use_case, train_use_case::TrainUseCase};
use crate::infra::tokenizer_store::TokenizerStore;

#[derive(Parser, Debug)]
#[command(
    name = "char-gpt-qa",
    version,
    about = "Train a character-level GPT on question/answer pairs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Vocab(args)   => run_vocab(args),
            Commands::Split(args)   => run_split(args),
            Commands::Stats(args)   => run_stats(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on '{}'", args.train_path);
    let summary = TrainUseCase::new(args.into()).execute()?;

    match (summary.best_epoch, summary.best_val_loss) {
        (Some(epoch), Some(loss)) => println!(
            "Training complete: {} steps, best val_loss={:.4} at epoch {}.",
            summary.steps,
            loss,
            epoch + 1
        ),
        _ => println!("Training complete: {} steps, no best checkpoint.", summary.steps),
    }
    Ok(())
}

fn run_vocab(args: VocabArgs) -> Result<()> {
    let size = prepare_use_case::build_vocab(&args.input, &args.output)?;
    println!("finish. words: {size}");
    Ok(())
}

fn run_split(args: SplitArgs) -> Result<()> {
    let counts = prepare_use_case::split_dataset(
        &args.input,
        &args.output_dir,
        args.train_fraction,
        args.seed,
    )?;
    println!("total: {}", counts.total);
    println!("train count: {}", counts.train);
    println!("val count: {}", counts.val);
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let buckets = prepare_use_case::token_stats(&args.input, &args.vocab_path, args.interval)?;
    let widest  = buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1);

    for b in &buckets {
        let bar = "#".repeat((b.count * 40).div_ceil(widest));
        println!("{:>6}-{:<6} {:>8} {}", b.lower, b.upper, b.count, bar);
    }

    if args.show > 0 {
        let samples = prepare_use_case::preview_samples(
            &args.input,
            &args.vocab_path,
            args.max_length,
            args.show,
        )?;
        println!("first {} records at max_length={}:", samples.len(), args.max_length);
        for (i, text) in samples.iter().enumerate() {
            println!("{i:>4}: {text}");
        }
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let vocab_size = TokenizerStore::new(&args.vocab_path).load()?.vocab_size();
    let cfg        = args.model.to_config(vocab_size);
    let report     = prepare_use_case::inspect_model(&cfg)?;

    println!("{}", serde_json::to_string_pretty(&cfg)?);
    println!("parameters: {}", report.num_params);
    for (layer, shape) in report.attention_shapes.iter().enumerate() {
        println!("layer {layer} attention: {shape:?}");
    }
    Ok(())
}
