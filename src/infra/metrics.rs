// ============================================================
// Layer 6 — Validation History Logger
// ============================================================
// Appends one CSV row per validation pass of a level.
//
// Metrics recorded per validation:
//   - update:    global minibatch counter when validation ran
//   - epoch:     zero-based epoch of that update
//   - valid_err: error rate on the validation split
//   - test_err:  error rate on the (augmented) test split
//   - best:      1 if this validation set a new minimum
//
// Output file: <output>/level_<n>/history.csv
//
// Example CSV output:
//   update,epoch,valid_err,test_err,best
//   370,0,0.412000,0.420000,1
//   740,0,0.388000,0.391000,1
//   ...
//
// A resumed run first drops the rows logged after its saved
// update, then appends to the same file, so the CSV always holds
// the full curve of the level with every validation once.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub update:    usize,
    pub epoch:     usize,
    pub valid_err: f64,
    pub test_err:  f64,
    pub best:      bool,
}

pub struct HistoryLogger {
    csv_path: PathBuf,
}

impl HistoryLogger {
    /// Open (or create with a header) `history.csv` inside `dir`.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("history.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "update,epoch,valid_err,test_err,best")?;
            tracing::debug!("Created history CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, r: &ValidationRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{}",
            r.update,
            r.epoch,
            r.valid_err,
            r.test_err,
            u8::from(r.best),
        )?;
        Ok(())
    }

    /// Drop every row whose update is past `update`.
    pub fn truncate_after(&self, update: usize) -> Result<()> {
        let body = fs::read_to_string(&self.csv_path)
            .with_context(|| format!("Cannot read '{}'", self.csv_path.display()))?;

        let mut kept    = String::with_capacity(body.len());
        let mut dropped = 0usize;
        for line in body.lines() {
            let row_update = line.split(',').next().and_then(|u| u.parse::<usize>().ok());
            match row_update {
                // The header never parses as a number
                Some(u) if u > update => dropped += 1,
                _ => {
                    kept.push_str(line);
                    kept.push('\n');
                }
            }
        }

        if dropped > 0 {
            fs::write(&self.csv_path, kept)
                .with_context(|| format!("Cannot write '{}'", self.csv_path.display()))?;
            tracing::debug!("Dropped {dropped} history rows after update {update}");
        }
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
