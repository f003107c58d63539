// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to
// its use case. The only layer that prints to stdout.
//
//   gpt-lm encode data/raw.jsonl --context-window 1024
//   gpt-lm train --max-epochs 3
//   gpt-lm predict --prompt "Once upon a time" --seed 7

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EncodeArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "gpt-lm",
    version = "0.1.0",
    about = "Train a small GPT-style language model on tokenised text, then generate from it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Encode(args)  => run_encode(args),
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    use crate::application::encode_use_case::EncodeUseCase;

    tracing::info!("Encoding corpus '{}'", args.input_file.display());
    let report = EncodeUseCase::new(args.into()).execute()?;

    println!(
        "Encoded {} chunks into '{}': {} training / {} validation lines.",
        report.chunks,
        report.output_dir.display(),
        report.train_lines,
        report.val_lines,
    );
    println!(
        "Tokenizer: '{}' (data needs vocab_size >= {})",
        report.tokenizer_path.display(),
        report.data_vocab
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.train_file.display());
    let outcome = TrainUseCase::new(args.into()).execute()?;

    let val = outcome
        .summary
        .val_loss
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
    println!(
        "Training complete: version {} | {} epochs | {} steps | train_loss={:.4} | val_loss={}",
        outcome.version,
        outcome.summary.epochs,
        outcome.summary.steps,
        outcome.summary.train_loss,
        val,
    );
    println!("Checkpoints saved in '{}'", outcome.run_dir.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let generation = PredictUseCase::new(args.into()).execute()?;
    println!("\n{}", generation.text);
    Ok(())
}
