// ============================================================
// Layer 5 — Joint Beam Decoder
// ============================================================
// Top-K decoding across the three trained level models.
//
//   Stage 1: level-1 probabilities → K best departments
//
//   Stage 2: for every slot k, append department token k to the
//            original input and score level 2. The per-example
//            surface of K × ydim2 scores is flattened and the K
//            best entries are kept:
//
//              flat = slot * ydim2 + label
//              slot = flat / ydim2,  label = flat % ydim2
//
//            so each survivor knows which department it came from.
//
//   Stage 3: same again with the category token of every stage-2
//            survivor; the single best entry gives the final
//            (department, category, subcategory) triple, and the
//            whole K × ydim3 surface is returned as soft_probs.
//
// Scoring modes:
//   rerank → surfaces hold the raw conditional probabilities of
//            the current level (parents only pick the token)
//   joint  → surfaces hold the parent's running score times the
//            conditional probability
//
// Every level sees the original words plus exactly one parent
// token, matching how its model was trained. K is clipped to the
// number of available candidates at every stage. Ties keep the
// lower flat index.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::data::augmenter::FeatureAugmenter;
use crate::domain::dictionary::Dictionary;
use crate::domain::example::{Level, LEVELS};
use crate::domain::prediction::{Candidate, JointPrediction};
use crate::domain::traits::Classifier;
use crate::ml::scorer::predict_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamScoring {
    #[default]
    Rerank,
    Joint,
}

impl FromStr for BeamScoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rerank" => Ok(BeamScoring::Rerank),
            "joint"  => Ok(BeamScoring::Joint),
            other    => Err(format!("unknown scoring '{other}' (expected rerank or joint)")),
        }
    }
}

/// The K best entries of `row`, best first. `k` is clipped to `row.len()`.
pub fn top_k(row: &[f32], k: usize) -> Vec<Candidate> {
    let mut order: Vec<usize> = (0..row.len()).collect();
    // Stable: equal scores keep ascending index order.
    order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
    order
        .into_iter()
        .take(k.min(row.len()))
        .map(|label| Candidate { label, prob: row[label] })
        .collect()
}

pub fn flat_index(slot: usize, label: usize, ydim: usize) -> usize {
    slot * ydim + label
}

pub fn split_index(flat: usize, ydim: usize) -> (usize, usize) {
    (flat / ydim, flat % ydim)
}

/// One surviving path of the beam for one example.
#[derive(Debug, Clone, PartialEq)]
struct Path {
    labels: Vec<usize>,
    score:  f32,
}

/// Decoder output for a whole split.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub predictions: Vec<JointPrediction>,
    /// Per example, the whole stage-3 surface: one block of ydim3
    /// scores per stage-2 survivor, indexed by `flat_index(slot, label, ydim3)`
    pub soft_probs:  Vec<Vec<f32>>,
}

/// One stage of the beam: the surviving paths and the surface they
/// were picked from, per example.
struct Expansion {
    beams:    Vec<Vec<Path>>,
    surfaces: Vec<Vec<f32>>,
}

impl DecodeResult {
    /// Predictions laid out `[level][example]`.
    pub fn label_rows(&self) -> [Vec<usize>; LEVELS] {
        let mut rows: [Vec<usize>; LEVELS] = Default::default();
        for p in &self.predictions {
            for (row, &label) in rows.iter_mut().zip(&p.labels) {
                row.push(label);
            }
        }
        rows
    }
}

pub struct JointBeamDecoder<'a> {
    models:     [&'a dyn Classifier; LEVELS],
    dictionary: &'a Dictionary,
    beam:       usize,
    scoring:    BeamScoring,
    batch_size: usize,
}

impl<'a> JointBeamDecoder<'a> {
    pub fn new(
        models:     [&'a dyn Classifier; LEVELS],
        dictionary: &'a Dictionary,
        beam:       usize,
        scoring:    BeamScoring,
        batch_size: usize,
    ) -> Self {
        Self { models, dictionary, beam, scoring, batch_size }
    }

    pub fn decode(&self, sequences: &[Vec<u32>]) -> Result<DecodeResult> {
        if self.beam == 0 {
            bail!("beam width must be at least 1");
        }
        for level in Level::ALL {
            if self.dictionary.ydim(level) == 0 {
                bail!("level {level} has no labels");
            }
            if self.models[level.index()].num_classes() != self.dictionary.ydim(level) {
                bail!(
                    "level {level} model has {} classes but the dictionary has {}",
                    self.models[level.index()].num_classes(),
                    self.dictionary.ydim(level)
                );
            }
        }

        // ── Stage 1 ───────────────────────────────────────────────────────────
        let probs1 = predict_all(self.models[0], sequences, self.batch_size)?;
        let mut beams: Vec<Vec<Path>> = probs1
            .iter()
            .map(|row| {
                top_k(row, self.beam)
                    .into_iter()
                    .map(|c| Path { labels: vec![c.label], score: c.prob })
                    .collect()
            })
            .collect();

        // ── Stages 2 and 3 ────────────────────────────────────────────────────
        let mut soft_probs = Vec::new();
        for level in [Level::Two, Level::Three] {
            let stage = self.expand(sequences, &beams, level)?;
            tracing::debug!("Level {level}: beam expanded for {} examples", stage.beams.len());
            beams      = stage.beams;
            soft_probs = stage.surfaces;
        }

        let mut predictions = Vec::with_capacity(beams.len());
        for paths in beams {
            let Some(best) = paths.first() else {
                bail!("empty beam");
            };
            predictions.push(JointPrediction {
                labels: [best.labels[0], best.labels[1], best.labels[2]],
                prob:   best.score,
            });
        }

        Ok(DecodeResult { predictions, soft_probs })
    }

    /// Score every surviving path at `level` and keep the best K per example.
    fn expand(&self, sequences: &[Vec<u32>], beams: &[Vec<Path>], level: Level) -> Result<Expansion> {
        let Some(parent) = level.parent() else {
            bail!("level {level} has no parent to expand from");
        };
        let ydim      = self.dictionary.ydim(level);
        let augmenter = FeatureAugmenter::new(self.dictionary);
        let slots     = beams.iter().map(Vec::len).max().unwrap_or(0);

        // probs[slot][example] over this level's labels
        let mut probs: Vec<Vec<Vec<f32>>> = Vec::with_capacity(slots);
        for slot in 0..slots {
            // Examples with a shorter beam reuse their last path; those rows are never read.
            let parents: Vec<usize> = beams
                .iter()
                .map(|paths| paths[slot.min(paths.len() - 1)].labels[parent.index()])
                .collect();
            let augmented = augmenter.augment_sequences(sequences, &parents, parent)?;
            probs.push(predict_all(self.models[level.index()], &augmented, self.batch_size)?);
        }

        let mut next = Expansion {
            beams:    Vec::with_capacity(beams.len()),
            surfaces: Vec::with_capacity(beams.len()),
        };
        for (n, paths) in beams.iter().enumerate() {
            let mut surface = vec![0.0f32; paths.len() * ydim];
            for (slot, path) in paths.iter().enumerate() {
                for (label, &p) in probs[slot][n].iter().enumerate().take(ydim) {
                    surface[flat_index(slot, label, ydim)] = match self.scoring {
                        BeamScoring::Rerank => p,
                        BeamScoring::Joint  => path.score * p,
                    };
                }
            }
            let survivors = top_k(&surface, self.beam)
                .into_iter()
                .map(|c| {
                    let (slot, label) = split_index(c.label, ydim);
                    let mut labels = paths[slot].labels.clone();
                    labels.push(label);
                    Path { labels, score: c.prob }
                })
                .collect();
            next.beams.push(survivors);
            next.surfaces.push(surface);
        }
        Ok(next)
    }
}
