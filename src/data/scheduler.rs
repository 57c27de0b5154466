// ============================================================
// Layer 4 — Minibatch Scheduler
// ============================================================
// Partitions the index range 0..n into minibatches:
//
//   - shuffle = false → 0..n in order
//   - shuffle = true  → a fresh permutation drawn from the
//                       scheduler's own seeded RNG
//
// Consecutive slices of `batch_size` form the minibatches. The
// remainder is kept as a smaller final batch, never dropped.
//
// Every call with shuffle = true consumes the RNG exactly once,
// so replaying the first E shuffles (`fast_forward`) puts a
// fresh scheduler into the state it had at the start of epoch E.
// That is what makes a resumed run see the same batch order as
// an uninterrupted one.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use anyhow::{bail, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// `(position, example indices)` pairs in iteration order.
pub type Minibatches = Vec<(usize, Vec<usize>)>;

/// Unshuffled partition of `0..n`, used for evaluation passes.
pub fn sequential(n: usize, batch_size: usize) -> Result<Minibatches> {
    chunk((0..n).collect(), batch_size)
}

fn chunk(idx: Vec<usize>, batch_size: usize) -> Result<Minibatches> {
    if batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    Ok(idx
        .chunks(batch_size)
        .map(<[usize]>::to_vec)
        .enumerate()
        .collect())
}

pub struct MinibatchScheduler {
    rng: StdRng,
}

impl MinibatchScheduler {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn partition(&mut self, n: usize, batch_size: usize, shuffle: bool) -> Result<Minibatches> {
        let mut idx: Vec<usize> = (0..n).collect();
        if shuffle {
            idx.shuffle(&mut self.rng);
        }
        chunk(idx, batch_size)
    }

    /// Consume the RNG draws of `epochs` shuffled partitions of size `n`.
    pub fn fast_forward(&mut self, n: usize, epochs: usize) {
        for _ in 0..epochs {
            let mut idx: Vec<usize> = (0..n).collect();
            idx.shuffle(&mut self.rng);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flatten(batches: &Minibatches) -> Vec<usize> {
        batches.iter().flat_map(|(_, b)| b.iter().copied()).collect()
    }

    #[test]
    fn test_remainder_is_kept() {
        let batches = sequential(10, 3).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|(_, b)| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert_eq!(batches[3], (3, vec![9]));
    }

    #[test]
    fn test_zero_examples_gives_no_batches() {
        assert!(sequential(0, 4).unwrap().is_empty());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        assert!(sequential(5, 0).is_err());
        assert!(MinibatchScheduler::new(1).partition(5, 0, true).is_err());
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut a = MinibatchScheduler::new(123);
        let mut b = MinibatchScheduler::new(123);
        for _ in 0..3 {
            assert_eq!(a.partition(40, 7, true).unwrap(), b.partition(40, 7, true).unwrap());
        }
    }

    #[test]
    fn test_fast_forward_matches_live_scheduler() {
        let mut live = MinibatchScheduler::new(9);
        for _ in 0..4 {
            live.partition(25, 4, true).unwrap();
        }
        let mut resumed = MinibatchScheduler::new(9);
        resumed.fast_forward(25, 4);
        assert_eq!(live.partition(25, 4, true).unwrap(), resumed.partition(25, 4, true).unwrap());
    }

    proptest! {
        #[test]
        fn prop_partition_covers_every_index_once(
            n in 0usize..200, batch_size in 1usize..40, seed in any::<u64>(), shuffle in any::<bool>()
        ) {
            let mut sched = MinibatchScheduler::new(seed);
            let batches   = sched.partition(n, batch_size, shuffle).unwrap();

            let mut seen = flatten(&batches);
            if !shuffle {
                prop_assert_eq!(&seen, &(0..n).collect::<Vec<_>>());
            }
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());

            // Only the last batch may be short; positions count up from 0
            for (i, (pos, b)) in batches.iter().enumerate() {
                prop_assert_eq!(*pos, i);
                if i + 1 < batches.len() {
                    prop_assert_eq!(b.len(), batch_size);
                } else {
                    prop_assert!(!b.is_empty() && b.len() <= batch_size);
                }
            }
        }
    }
}
