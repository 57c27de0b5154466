// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`  — trains the three level classifiers on a
//                 JSONL dataset, then decodes and scores
//   2. `decode` — re-runs joint decoding on a finished run
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DecodeArgs, TrainArgs};

use crate::domain::prediction::ErrorComparison;
use crate::infra::interrupt::InterruptFlag;

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "product-taxonomy",
    version = "0.1.0",
    about = "Train a three-level product category classifier and decode joint predictions."
)]
pub struct Cli {
    /// The subcommand to run (train or decode)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Decode(args) => run_decode(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset: {}", args.dataset.display());

    // Ctrl-C finishes the current epoch, saves the level and stops the run
    let interrupt = InterruptFlag::install()?;

    match TrainUseCase::new(args.into(), interrupt).execute()? {
        Some(comparison) => print_errors(&comparison),
        None => println!("Training interrupted. Finished levels are saved; rerun with --start-level / --resume."),
    }
    Ok(())
}

/// Handles the `decode` subcommand.
fn run_decode(args: DecodeArgs) -> Result<()> {
    use crate::application::decode_use_case::DecodeUseCase;

    let comparison = DecodeUseCase::new(args.output, args.dataset, args.beam, args.scoring).execute()?;
    print_errors(&comparison);
    Ok(())
}

fn print_errors(comparison: &ErrorComparison) {
    println!("\n{:<6} {:>10} {:>10} {:>10}", "", "all three", "any two", "any one");
    for (name, r) in [("hard", comparison.hard), ("soft", comparison.soft)] {
        println!("{:<6} {:>10.4} {:>10.4} {:>10.4}", name, r.all_three, r.any_two, r.any_one);
    }
}
