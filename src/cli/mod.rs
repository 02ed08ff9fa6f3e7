// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2.
//
// Two commands are supported:
//   1. `train`      — pretrains generator + discriminator
//   2. `show-batch` — prints one masked batch for inspection
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ShowBatchArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "electra-pretrain",
    version,
    about = "Pretrain ELECTRA (replaced-token detection) language models on plain-text corpora."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::ShowBatch(args) => run_show_batch(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::PretrainUseCase;

    tracing::info!("Starting pretraining on documents in: {}", args.run.corpus_dir);
    let checkpoint_dir = args.run.checkpoint_dir.clone();
    PretrainUseCase::new(args.into()).execute()?;

    println!("Pretraining complete. Checkpoints saved to '{checkpoint_dir}'.");
    Ok(())
}

fn run_show_batch(args: ShowBatchArgs) -> Result<()> {
    use crate::application::show_batch_use_case::ShowBatchUseCase;

    let options = args.options();
    let rendered = ShowBatchUseCase::new(args.run.to_config(), options).execute()?;
    print!("{rendered}");
    Ok(())
}
