// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything one level's training produces.
//
// What gets saved per level:
//   1. model.mpk.gz      — best parameters so far (or the live
//                          ones while no validation has run)
//   2. live.mpk.gz       — the live parameters at the last save
//   3. optimizer.mpk.gz  — optimiser state at the last save
//   4. state.json        — update/epoch counters, batch position
//                          and the early-stopping history
//   5. config.json       — the LevelConfig (architecture + options)
//   6. history.json      — (valid_err, test_err) pairs, plus the
//                          final errors and test predictions once
//                          the level has finished
//
// Why save the config separately?
//   The decoder rebuilds each level's model from config.json
//   before loading the weights into it. Without the config we
//   cannot reconstruct the architecture.
//
// Records use Burn's NamedMpkGzFileRecorder with full precision:
//   - MessagePack, gzip compressed
//   - f32 kept as-is, so a resumed run continues from exactly the
//     parameters it stopped with
//
// File naming convention:
//   <output>/
//     level_1/
//       model.mpk.gz  live.mpk.gz  optimizer.mpk.gz
//       state.json    config.json  history.json  history.csv
//     level_2/ ...
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Record, Recorder},
};

use crate::application::train_use_case::LevelConfig;
use crate::domain::example::Level;
use crate::ml::trainer::{LevelHistory, TrainerState};

type FileRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Manages the checkpoint directory of one level.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager for `dir`, creating the directory (and parents) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `<root>/level_<n>`
    pub fn for_level(root: &Path, level: Level) -> Result<Self> {
        Self::new(root.join(level.dir_name()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the best-parameters record, without extension.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join("model")
    }

    pub fn has_model(&self) -> bool {
        self.dir.join("model.mpk.gz").exists()
    }

    // ── JSON files ────────────────────────────────────────────────────────────

    pub fn save_config(&self, cfg: &LevelConfig) -> Result<()> {
        self.write_json("config.json", cfg)
    }

    /// Called by the decoder to rebuild the level's architecture.
    pub fn load_config(&self) -> Result<LevelConfig> {
        self.read_json("config.json").with_context(|| {
            format!(
                "No level config in '{}'. Has this level been trained?",
                self.dir.display()
            )
        })
    }

    pub fn save_state(&self, state: &TrainerState) -> Result<()> {
        self.write_json("state.json", state)
    }

    /// The resumable trainer state, or `None` when no periodic save happened yet.
    pub fn load_state(&self) -> Result<Option<TrainerState>> {
        if !self.dir.join("state.json").exists() {
            return Ok(None);
        }
        self.read_json("state.json").map(Some)
    }

    pub fn save_history(&self, history: &LevelHistory) -> Result<()> {
        self.write_json("history.json", history)
    }

    pub fn load_history(&self) -> Result<LevelHistory> {
        self.read_json("history.json")
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Cannot parse '{}'", path.display()))
    }
}

// ── Burn records ──────────────────────────────────────────────────────────────

/// Write any Burn record (module or optimiser) to `<path>.mpk.gz`.
pub fn save_record<B: Backend, R: Record<B>>(record: R, path: &Path) -> Result<()> {
    Recorder::<B>::record(&FileRecorder::new(), record, path.to_path_buf())
        .with_context(|| format!("Failed to save record to '{}'", path.display()))?;
    Ok(())
}

/// Read a record written by [`save_record`].
pub fn load_record<B: Backend, R: Record<B>>(path: &Path, device: &B::Device) -> Result<R> {
    Recorder::<B>::load(&FileRecorder::new(), path.to_path_buf(), device).with_context(|| {
        format!("Cannot load record '{}'. Have you trained this level first?", path.display())
    })
}

/// Load the weights at `path` into a freshly initialised `module`.
pub fn load_module<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
    let record = load_record::<B, M::Record>(path, device)?;
    Ok(module.load_record(record))
}
