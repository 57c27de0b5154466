// ============================================================
// Layer 3 — Predictions
// ============================================================
// Output shapes shared by the level trainers, the joint beam
// decoder and the error scorer. All label ids are the dense
// per-level ids handed out by the Dictionary.

use serde::{Deserialize, Serialize};

use crate::domain::example::LEVELS;

/// One ranked label with the score it was ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: usize,
    pub prob:  f32,
}

/// The decoder's final answer for one example.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPrediction {
    pub labels: [usize; LEVELS],
    /// Level-3 probability of the chosen triple
    pub prob:   f32,
}

/// Error rates of a triple prediction: `1 - share of examples with
/// all three / at least two / at least one level correct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Not all three levels correct (at least one wrong)
    pub all_three: f64,
    /// Fewer than two levels correct (at least two wrong)
    pub any_two:   f64,
    /// No level correct (all three wrong)
    pub any_one:   f64,
}

/// Everything written to `joint_predictions.json` after decoding.
///
/// Rows are indexed `[level][example]` except `soft_probs`, which
/// holds each example's level-3 beam surface: K × ydim3 scores,
/// slot-major (fewer slots when the beam was clipped).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionFile {
    pub hard_predictions:      [Vec<usize>; LEVELS],
    pub hard_prediction_probs: [Vec<f32>; LEVELS],
    pub soft_pred:             [Vec<usize>; LEVELS],
    pub soft_probs:            Vec<Vec<f32>>,
    pub target:                [Vec<usize>; LEVELS],
}

/// Hard (per-level argmax) and soft (beam) scores side by side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorComparison {
    pub hard: ErrorReport,
    pub soft: ErrorReport,
}
