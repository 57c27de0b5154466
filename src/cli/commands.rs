// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `decode`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, and the FromStr
//     enums: encoder, optimizer, stop rule, scoring)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::PipelineConfig;
use crate::ml::{decoder::BeamScoring, model::EncoderKind, optim::OptimizerKind, trainer::StopRule};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the three level classifiers, then decode and score the test set
    Train(TrainArgs),

    /// Re-run joint decoding and scoring on a finished run
    Decode(DecodeArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding train.jsonl and test.jsonl
    #[arg(long, default_value = "data/products")]
    pub dataset: PathBuf,

    /// Run directory for the dictionary, level checkpoints and results
    #[arg(long, default_value = "runs/latest")]
    pub output: PathBuf,

    /// Vocabulary size, [PAD] and [UNK] included; rarer words map to [UNK]
    #[arg(long, default_value_t = 50_000)]
    pub n_words: usize,

    /// Training descriptions with more tokens are dropped (0 keeps all)
    #[arg(long, default_value_t = 100)]
    pub maxlen: usize,

    /// Word embedding and recurrent hidden size
    #[arg(long, default_value_t = 128)]
    pub dim_proj: usize,

    /// Recurrent encoder: lstm or gru
    #[arg(long, default_value = "lstm")]
    pub encoder: EncoderKind,

    /// Train without dropout after pooling
    #[arg(long)]
    pub no_dropout: bool,

    /// Weight decay on the classifier weights
    #[arg(long, default_value_t = 0.0)]
    pub decay_c: f64,

    /// Learning rate (ignored by adadelta)
    #[arg(long, default_value_t = 1e-4)]
    pub lrate: f64,

    /// Optimiser: sgd, adadelta or rmsprop
    #[arg(long, default_value = "adadelta")]
    pub optimizer: OptimizerKind,

    /// Training minibatch size
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Batch size for validation, test and decoding passes
    #[arg(long, default_value_t = 64)]
    pub valid_batch_size: usize,

    /// Non-improving validations tolerated before early stopping
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    /// Maximum number of epochs per level
    #[arg(long, default_value_t = 5000)]
    pub max_epochs: usize,

    /// Log the training cost every N updates
    #[arg(long, default_value_t = 10)]
    pub disp_freq: usize,

    /// Validate every N updates (0 → once per epoch)
    #[arg(long, default_value_t = 370)]
    pub valid_freq: usize,

    /// Save resumable state every N updates (0 → once per epoch)
    #[arg(long, default_value_t = 1110)]
    pub save_freq: usize,

    /// Early stopping rule: window or consecutive
    #[arg(long, default_value = "window")]
    pub stop_rule: StopRule,

    /// Seed for the data split and minibatch shuffling
    #[arg(long, default_value_t = 123)]
    pub seed: u64,

    /// Share of the training file held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub valid_portion: f64,

    /// Subsample the training set to this many examples
    #[arg(long)]
    pub train_size: Option<usize>,

    /// Subsample the test set to this many examples
    #[arg(long)]
    pub test_size: Option<usize>,

    /// Beam width of the joint decoder
    #[arg(long, default_value_t = 5)]
    pub beam: usize,

    /// Beam scoring: rerank or joint
    #[arg(long, default_value = "rerank")]
    pub scoring: BeamScoring,

    /// Continue each level from its last saved state
    #[arg(long)]
    pub resume: bool,

    /// Warm start every level from the models of an earlier run directory
    #[arg(long)]
    pub reload: Option<PathBuf>,

    /// First level to train; earlier levels are read from --output
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub start_level: u8,
}

/// Convert CLI TrainArgs into the application-layer PipelineConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for PipelineConfig {
    fn from(a: TrainArgs) -> Self {
        let per_epoch = |freq: usize| (freq > 0).then_some(freq);
        PipelineConfig {
            dataset:          a.dataset,
            output:           a.output,
            n_words:          a.n_words,
            maxlen:           (a.maxlen > 0).then_some(a.maxlen),
            dim_proj:         a.dim_proj,
            encoder:          a.encoder,
            use_dropout:      !a.no_dropout,
            decay_c:          a.decay_c,
            lrate:            a.lrate,
            optimizer:        a.optimizer,
            batch_size:       a.batch_size,
            valid_batch_size: a.valid_batch_size,
            patience:         a.patience,
            max_epochs:       a.max_epochs,
            disp_freq:        a.disp_freq,
            valid_freq:       per_epoch(a.valid_freq),
            save_freq:        per_epoch(a.save_freq),
            stop_rule:        a.stop_rule,
            seed:             a.seed,
            valid_portion:    a.valid_portion,
            train_size:       a.train_size,
            test_size:        a.test_size,
            beam:             a.beam,
            scoring:          a.scoring,
            resume:           a.resume,
            reload:           a.reload,
            start_level:      a.start_level,
        }
    }
}

/// All arguments for the `decode` command
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Run directory written by `train`
    #[arg(long, default_value = "runs/latest")]
    pub output: PathBuf,

    /// Dataset directory (defaults to the one the run was trained on)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Beam width (defaults to the run's setting)
    #[arg(long)]
    pub beam: Option<usize>,

    /// Beam scoring: rerank or joint (defaults to the run's setting)
    #[arg(long)]
    pub scoring: Option<BeamScoring>,
}
