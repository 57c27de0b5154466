// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Carves a validation set out of the training records and
// optionally subsamples the result.
//
// Why shuffle before splitting?
//   Product feeds are usually ordered by department. Without
//   shuffling, the validation set would only contain the last
//   department in the file.
//
// Both functions take the caller's seeded RNG so that two runs
// over the same corpus produce the same partitions. The decode
// command relies on that to rebuild the exact test set that
// training saw.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom};

/// Shuffle `samples` and split off `valid_portion` of them as the validation set.
///
/// Returns `(train, valid)`. The training share is
/// `round(n * (1 - valid_portion))`.
pub fn split_train_valid<T>(
    mut samples:   Vec<T>,
    valid_portion: f64,
    rng:           &mut StdRng,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * (1.0 - valid_portion)).round() as usize;
    let split_at = split_at.min(total);

    // split_off(n) leaves [0..n) in samples and returns [n..total)
    let valid = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        valid.len(),
    );

    (samples, valid)
}

/// Keep a random subset of `size` items, or everything when `size` is `None`
/// or not smaller than the input.
pub fn subsample<T>(mut items: Vec<T>, size: Option<usize>, rng: &mut StdRng) -> Vec<T> {
    match size {
        Some(size) if size < items.len() => {
            items.shuffle(rng);
            items.truncate(size);
            items
        }
        _ => items,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(123)
    }

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_valid(items, 0.1, &mut rng());
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(),   10);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_valid(items, 0.3, &mut rng());
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_valid(items, 0.1, &mut rng());
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = split_train_valid((0..30).collect::<Vec<usize>>(), 0.2, &mut rng());
        let b = split_train_valid((0..30).collect::<Vec<usize>>(), 0.2, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_subsample_sizes() {
        let items: Vec<usize> = (0..20).collect();
        assert_eq!(subsample(items.clone(), Some(5), &mut rng()).len(), 5);
        assert_eq!(subsample(items.clone(), Some(50), &mut rng()), items);
        assert_eq!(subsample(items.clone(), None, &mut rng()), items);
    }
}
