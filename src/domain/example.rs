// ============================================================
// Layer 3 — Levels, Examples and Splits
// ============================================================
// A product carries three nested category labels:
//
//   Level::One   → department    (e.g. "Electronics")
//   Level::Two   → category      (e.g. "Audio")
//   Level::Three → subcategory   (e.g. "Headphones")
//
// A Split stores its examples as parallel arrays: one token
// sequence per example and one label column per level. The
// column layout is what the trainers and the decoder index into.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of category levels in the taxonomy.
pub const LEVELS: usize = 3;

// ─── Level ────────────────────────────────────────────────────────────────────
/// One level of the category hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    One,
    Two,
    Three,
}

impl Level {
    /// All levels in training order.
    pub const ALL: [Level; LEVELS] = [Level::One, Level::Two, Level::Three];

    /// Zero-based column index (0, 1, 2).
    pub fn index(self) -> usize {
        match self {
            Level::One   => 0,
            Level::Two   => 1,
            Level::Three => 2,
        }
    }

    /// One-based level number used in file names and logs.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Level::One),
            2 => Ok(Level::Two),
            3 => Ok(Level::Three),
            _ => bail!("category level must be 1, 2 or 3 (got {n})"),
        }
    }

    /// The level whose label is appended to this level's input.
    pub fn parent(self) -> Option<Level> {
        match self {
            Level::One   => None,
            Level::Two   => Some(Level::One),
            Level::Three => Some(Level::Two),
        }
    }

    /// Human-readable name of the category column.
    pub fn name(self) -> &'static str {
        match self {
            Level::One   => "department",
            Level::Two   => "category",
            Level::Three => "subcategory",
        }
    }

    /// Directory that holds this level's checkpoints, e.g. `level_2`.
    pub fn dir_name(self) -> String {
        format!("level_{}", self.number())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl TryFrom<u8> for Level {
    type Error = anyhow::Error;

    fn try_from(n: u8) -> Result<Self> {
        Level::from_number(n)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.number()
    }
}

// ─── Example ──────────────────────────────────────────────────────────────────
/// One encoded product: word ids plus its three label ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub tokens: Vec<u32>,
    pub labels: [usize; LEVELS],
}

// ─── Split ────────────────────────────────────────────────────────────────────
/// A train, valid or test partition stored column-wise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub sequences: Vec<Vec<u32>>,
    pub labels:    [Vec<usize>; LEVELS],
}

impl Split {
    /// Build a split from parallel arrays, rejecting ragged columns.
    pub fn new(sequences: Vec<Vec<u32>>, labels: [Vec<usize>; LEVELS]) -> Result<Self> {
        for (i, column) in labels.iter().enumerate() {
            if column.len() != sequences.len() {
                bail!(
                    "label column {} has {} entries but there are {} sequences",
                    i + 1,
                    column.len(),
                    sequences.len()
                );
            }
        }
        Ok(Self { sequences, labels })
    }

    pub fn from_examples(examples: Vec<Example>) -> Self {
        let mut split = Split::default();
        for ex in examples {
            for (column, label) in split.labels.iter_mut().zip(ex.labels) {
                column.push(label);
            }
            split.sequences.push(ex.tokens);
        }
        split
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Label column for one level.
    pub fn labels(&self, level: Level) -> &[usize] {
        &self.labels[level.index()]
    }

    /// Same labels, new token sequences (used by the augmenter).
    pub fn with_sequences(&self, sequences: Vec<Vec<u32>>) -> Result<Self> {
        Split::new(sequences, self.labels.clone())
    }
}

// ─── Dataset ──────────────────────────────────────────────────────────────────
/// The three partitions every level trains and evaluates on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub train: Split,
    pub valid: Split,
    pub test:  Split,
}
