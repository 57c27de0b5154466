// ============================================================
// Layer 4 — Batch Preparation
// ============================================================
// Turns a group of variable-length token sequences into one
// padded, time-major batch plus a mask.
//
// Layout (maxlen = T, batch size = N):
//
//   tokens[t * N + n] = token t of sequence n, or 0 past its end
//   mask  [t * N + n] = 1.0 if t < len(n) else 0.0
//
// Padding only ever sits at the tail of a sequence, so the mask
// of each column is a run of ones followed by zeros. The model
// layer reshapes these flat buffers into [T, N] tensors and
// swaps them to batch-major before the embedding lookup.
//
// Reference: Burn Book §4 (Batcher)

use crate::domain::dictionary::PAD_ID;

/// A padded minibatch ready to be turned into tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Time-major token ids, `maxlen * size` entries
    pub tokens: Vec<u32>,
    /// Time-major 0/1 mask, same shape as `tokens`
    pub mask:   Vec<f32>,
    /// One label per example (zeros when labels are unknown)
    pub labels: Vec<usize>,
    pub maxlen: usize,
    pub size:   usize,
}

impl Batch {
    /// Pad `sequences` to a common length.
    ///
    /// `labels` must be empty or hold one entry per sequence; an empty
    /// vector is replaced by zeros. `maxlen` is at least 1 so that a
    /// batch of empty sequences still has a valid tensor shape.
    pub fn from_sequences(sequences: &[&[u32]], labels: Vec<usize>) -> Self {
        let size   = sequences.len();
        let maxlen = sequences.iter().map(|s| s.len()).max().unwrap_or(0).max(1);

        let mut tokens = vec![PAD_ID; maxlen * size];
        let mut mask   = vec![0.0f32; maxlen * size];

        for (n, seq) in sequences.iter().enumerate() {
            for (t, &tok) in seq.iter().enumerate() {
                tokens[t * size + n] = tok;
                mask[t * size + n]   = 1.0;
            }
        }

        let labels = if labels.is_empty() { vec![0; size] } else { labels };
        debug_assert_eq!(labels.len(), size);

        Self { tokens, mask, labels, maxlen, size }
    }

    /// Token at time step `t` of example `n`.
    pub fn token(&self, t: usize, n: usize) -> u32 {
        self.tokens[t * self.size + n]
    }

    /// Unpadded token sequence of example `n`.
    pub fn sequence(&self, n: usize) -> Vec<u32> {
        (0..self.maxlen)
            .take_while(|&t| self.mask[t * self.size + n] > 0.0)
            .map(|t| self.token(t, n))
            .collect()
    }

    /// Real (unpadded) length of every example.
    pub fn lengths(&self) -> Vec<usize> {
        (0..self.size).map(|n| self.sequence(n).len()).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_major_layout() {
        let a: &[u32] = &[5, 6, 7];
        let b: &[u32] = &[8];
        let batch = Batch::from_sequences(&[a, b], vec![1, 0]);

        assert_eq!(batch.maxlen, 3);
        assert_eq!(batch.size, 2);
        // t = 0 row, then t = 1, then t = 2
        assert_eq!(batch.tokens, vec![5, 8, 6, 0, 7, 0]);
        assert_eq!(batch.mask, vec![1.0, 1.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(batch.sequence(1), vec![8]);
        assert_eq!(batch.lengths(), vec![3, 1]);
    }

    #[test]
    fn test_missing_labels_become_zeros() {
        let a: &[u32] = &[3];
        let batch = Batch::from_sequences(&[a, a, a], Vec::new());
        assert_eq!(batch.labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_empty_sequences_keep_one_step() {
        let e: &[u32] = &[];
        let batch = Batch::from_sequences(&[e], vec![2]);
        assert_eq!(batch.maxlen, 1);
        assert_eq!(batch.tokens, vec![PAD_ID]);
        assert_eq!(batch.mask, vec![0.0]);
    }

    proptest! {
        #[test]
        fn prop_mask_is_ones_then_zeros(
            seqs in prop::collection::vec(prop::collection::vec(2u32..50, 0..12), 1..8)
        ) {
            let refs: Vec<&[u32]> = seqs.iter().map(|s| s.as_slice()).collect();
            let batch = Batch::from_sequences(&refs, Vec::new());

            for (n, seq) in seqs.iter().enumerate() {
                let column: Vec<f32> = (0..batch.maxlen)
                    .map(|t| batch.mask[t * batch.size + n])
                    .collect();
                // Non-increasing along time and summing to the real length
                prop_assert!(column.windows(2).all(|w| w[0] >= w[1]));
                prop_assert_eq!(column.iter().sum::<f32>() as usize, seq.len());
                prop_assert_eq!(&batch.sequence(n), seq);
            }
        }
    }
}
