// ============================================================
// Layer 4 — Per-Level Datasets
// ============================================================
// A LevelData is what one LevelTrainer sees: the (already
// augmented) token sequences of each partition paired with the
// label column of a single level.

use crate::data::batcher::Batch;
use crate::domain::example::{Dataset, Level, Split};

/// Sequences and labels for one partition at one level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSet {
    pub sequences: Vec<Vec<u32>>,
    pub labels:    Vec<usize>,
}

impl LabeledSet {
    pub fn from_split(split: &Split, level: Level) -> Self {
        Self {
            sequences: split.sequences.clone(),
            labels:    split.labels(level).to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Gather the examples at `indices` into a padded batch.
    pub fn batch(&self, indices: &[usize]) -> Batch {
        let seqs: Vec<&[u32]> = indices.iter().map(|&i| self.sequences[i].as_slice()).collect();
        let labels            = indices.iter().map(|&i| self.labels[i]).collect();
        Batch::from_sequences(&seqs, labels)
    }
}

/// Train, valid and test partitions for one level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelData {
    pub train: LabeledSet,
    pub valid: LabeledSet,
    pub test:  LabeledSet,
}

impl LevelData {
    pub fn new(dataset: &Dataset, level: Level) -> Self {
        Self {
            train: LabeledSet::from_split(&dataset.train, level),
            valid: LabeledSet::from_split(&dataset.valid, level),
            test:  LabeledSet::from_split(&dataset.test, level),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_gathers_in_index_order() {
        let set = LabeledSet {
            sequences: vec![vec![2], vec![3, 4], vec![5]],
            labels:    vec![0, 1, 2],
        };
        let batch = set.batch(&[2, 0]);
        assert_eq!(batch.labels, vec![2, 0]);
        assert_eq!(batch.sequence(0), vec![5]);
        assert_eq!(batch.sequence(1), vec![2]);
    }

    #[test]
    fn test_level_data_picks_label_column() {
        let split = Split::new(vec![vec![2], vec![3]], [vec![0, 1], vec![2, 3], vec![4, 5]]).unwrap();
        let dataset = Dataset { train: split.clone(), valid: split.clone(), test: split };
        let data = LevelData::new(&dataset, Level::Two);
        assert_eq!(data.train.labels, vec![2, 3]);
        assert_eq!(data.test.sequences, vec![vec![2], vec![3]]);
    }
}
