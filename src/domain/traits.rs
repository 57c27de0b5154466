// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the layers:
//
//   DatasetSource → anything that yields raw labelled products
//                   (JsonlLoader today)
//   Classifier    → anything that maps a batch to per-class
//                   probabilities (the Burn inferencer, or a
//                   hand-written table in tests)
//   LevelModel    → a Classifier that can also be trained one
//                   minibatch at a time, snapshotted and saved
//
// The LevelTrainer and the JointBeamDecoder are written against
// these traits only, so their control flow is tested without
// building a single tensor.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::data::batcher::Batch;
use crate::data::loader::RawCorpus;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Any component that can load the raw train/test product records.
pub trait DatasetSource {
    fn load(&self) -> Result<RawCorpus>;
}

// ─── Classifier ───────────────────────────────────────────────────────────────
/// Maps each example of a batch to a probability row over the level's labels.
pub trait Classifier {
    /// Number of labels (the length of every returned row).
    fn num_classes(&self) -> usize;

    /// One row per example, in batch order. Rows sum to one.
    fn predict_proba(&self, batch: &Batch) -> Result<Vec<Vec<f32>>>;
}

// ─── LevelModel ───────────────────────────────────────────────────────────────
/// A trainable classifier for one category level.
///
/// `Params` is a cheap copy of the learnable state; the trainer keeps
/// one around as the best-so-far snapshot.
pub trait LevelModel: Classifier + Sized {
    type Params: Clone;

    /// One optimisation step on a minibatch. Returns the cost before the update.
    fn train_step(&mut self, batch: &Batch) -> Result<f64>;

    fn snapshot(&self) -> Self::Params;

    fn restore(&mut self, params: &Self::Params);

    /// Persist a parameter snapshot. `path` has no extension.
    fn save_params(&self, params: &Self::Params, path: &Path) -> Result<()>;

    /// Read back a snapshot written by [`LevelModel::save_params`].
    fn load_params(&self, path: &Path) -> Result<Self::Params>;

    /// Persist the live parameters plus any optimiser state into `dir`.
    fn save_state(&self, dir: &Path) -> Result<()>;

    /// Inverse of [`LevelModel::save_state`].
    fn load_state(self, dir: &Path) -> Result<Self>;
}
