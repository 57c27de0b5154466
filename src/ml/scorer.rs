// ============================================================
// Layer 5 — Evaluation and Error Scoring
// ============================================================
// Two kinds of numbers come out of a run:
//
//   pred_error     → per level, the share of a split whose argmax
//                    label is wrong (1 - correct / N)
//   ErrorScorer    → across levels, 1 - the share of examples
//                    with all 3, at least 2 or at least 1 label
//                    right
//
// Evaluation batches are taken in order (no shuffle), so the
// probability rows line up with the split.

use anyhow::{bail, Result};

use crate::data::batcher::Batch;
use crate::data::dataset::LabeledSet;
use crate::data::scheduler::sequential;
use crate::domain::example::LEVELS;
use crate::domain::prediction::ErrorReport;
use crate::domain::traits::Classifier;

/// Probability rows for every sequence, batched in order.
pub fn predict_all<C: Classifier + ?Sized>(
    classifier: &C,
    sequences:  &[Vec<u32>],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut rows = Vec::with_capacity(sequences.len());
    for (_, indices) in sequential(sequences.len(), batch_size)? {
        let seqs: Vec<&[u32]> = indices.iter().map(|&i| sequences[i].as_slice()).collect();
        let batch = Batch::from_sequences(&seqs, Vec::new());
        let probs = classifier.predict_proba(&batch)?;
        if probs.len() != batch.size {
            bail!("classifier returned {} rows for a batch of {}", probs.len(), batch.size);
        }
        rows.extend(probs);
    }
    Ok(rows)
}

/// Index of the largest entry; the first one wins a tie.
pub fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}

/// `(argmax, max probability)` for every row.
pub fn argmax_rows(rows: &[Vec<f32>]) -> (Vec<usize>, Vec<f32>) {
    rows.iter()
        .map(|row| {
            let i = argmax(row);
            (i, row.get(i).copied().unwrap_or(0.0))
        })
        .unzip()
}

/// Share of `set` whose argmax prediction differs from its label.
pub fn pred_error<C: Classifier + ?Sized>(classifier: &C, set: &LabeledSet, batch_size: usize) -> Result<f64> {
    if set.is_empty() {
        bail!("cannot score an empty split");
    }
    let probs = predict_all(classifier, &set.sequences, batch_size)?;
    let correct = probs
        .iter()
        .zip(&set.labels)
        .filter(|(row, &label)| argmax(row) == label)
        .count();
    Ok(1.0 - correct as f64 / set.len() as f64)
}

// ─── ErrorScorer ──────────────────────────────────────────────────────────────

pub struct ErrorScorer;

impl ErrorScorer {
    /// Compare `[level][example]` predictions against targets of the same shape.
    pub fn score(predictions: &[Vec<usize>; LEVELS], targets: &[Vec<usize>; LEVELS]) -> Result<ErrorReport> {
        let n = targets[0].len();
        for (p, t) in predictions.iter().zip(targets) {
            if p.len() != n || t.len() != n {
                bail!("prediction and target rows must all have {n} entries");
            }
        }
        if n == 0 {
            bail!("cannot score zero examples");
        }

        // at_least[c]: examples with at least c levels right
        let mut at_least = [0usize; LEVELS + 1];
        for i in 0..n {
            let right = (0..LEVELS).filter(|&k| predictions[k][i] == targets[k][i]).count();
            for slot in at_least.iter_mut().take(right + 1).skip(1) {
                *slot += 1;
            }
        }

        let error = |count: usize| 1.0 - count as f64 / n as f64;
        Ok(ErrorReport {
            all_three: error(at_least[3]),
            any_two:   error(at_least[2]),
            any_one:   error(at_least[1]),
        })
    }
}
