// ============================================================
// Layer 4 — Feature Augmenter
// ============================================================
// Appends the parent level's label to every input sequence as
// one extra token, so a level-k model conditions on level k-1:
//
//   level 1:  [w1 w2 w3]                   (unchanged)
//   level 2:  [w1 w2 w3 <department:X>]
//   level 3:  [w1 w2 w3 <category:Y>]
//
// Only the immediate parent is appended; level 3 never sees the
// department token.
//
// Where the parent label comes from:
//   - train / valid → ground truth
//   - test          → the previous level's predictions when the
//                     caller has them, ground truth otherwise
//
// The joint decoder uses `augment_sequences` directly with each
// beam slot's candidate labels.

use anyhow::{anyhow, Result};

use crate::domain::dictionary::Dictionary;
use crate::domain::example::{Dataset, Level, Split};

pub struct FeatureAugmenter<'a> {
    dictionary: &'a Dictionary,
}

impl<'a> FeatureAugmenter<'a> {
    pub fn new(dictionary: &'a Dictionary) -> Self {
        Self { dictionary }
    }

    /// Append the augmentation token of `parent` label `labels[i]` to `sequences[i]`.
    pub fn augment_sequences(
        &self,
        sequences: &[Vec<u32>],
        labels:    &[usize],
        parent:    Level,
    ) -> Result<Vec<Vec<u32>>> {
        if sequences.len() != labels.len() {
            return Err(anyhow!(
                "{} sequences but {} {} labels",
                sequences.len(),
                labels.len(),
                parent.name()
            ));
        }

        sequences
            .iter()
            .zip(labels)
            .map(|(seq, &label)| {
                let token = self.dictionary.augmentation_token(parent, label).ok_or_else(|| {
                    anyhow!("no augmentation token for {} label {}", parent.name(), label)
                })?;
                let mut out = Vec::with_capacity(seq.len() + 1);
                out.extend_from_slice(seq);
                out.push(token);
                Ok(out)
            })
            .collect()
    }

    /// Inputs for `level`, conditioned on the parent's ground-truth labels.
    pub fn augment_split(&self, split: &Split, level: Level) -> Result<Split> {
        match level.parent() {
            None => Ok(split.clone()),
            Some(parent) => {
                let seqs = self.augment_sequences(&split.sequences, split.labels(parent), parent)?;
                split.with_sequences(seqs)
            }
        }
    }

    /// Build the three partitions a `level` trainer consumes.
    ///
    /// `test_parents` replaces the ground-truth parent labels of the
    /// test split when given.
    pub fn augment_dataset(
        &self,
        dataset:      &Dataset,
        level:        Level,
        test_parents: Option<&[usize]>,
    ) -> Result<Dataset> {
        let train = self.augment_split(&dataset.train, level)?;
        let valid = self.augment_split(&dataset.valid, level)?;
        let test  = match (level.parent(), test_parents) {
            (Some(parent), Some(predicted)) => {
                let seqs = self.augment_sequences(&dataset.test.sequences, predicted, parent)?;
                dataset.test.with_sequences(seqs)?
            }
            _ => self.augment_split(&dataset.test, level)?,
        };
        Ok(Dataset { train, valid, test })
    }
}
