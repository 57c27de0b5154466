// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw JSONL product records to padded,
// time-major minibatches.
//
// The pipeline flows in this order:
//
//   train.jsonl / test.jsonl
//       │
//       ▼
//   JsonlLoader        → parses records, collects label names
//       │
//       ▼
//   Preprocessor       → strips markup, normalises whitespace
//       │
//       ▼
//   Tokenizer          → words to dictionary ids (infra layer)
//       │
//       ▼
//   splitter           → seeded train/valid split, subsampling
//       │
//       ▼
//   FeatureAugmenter   → appends the parent level's label token
//       │
//       ▼
//   LevelData          → one label column per level
//       │
//       ▼
//   MinibatchScheduler → shuffled or sequential index groups
//       │
//       ▼
//   Batch              → padded token ids + mask
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads train.jsonl / test.jsonl from the dataset directory
pub mod loader;

/// Cleans raw product descriptions
pub mod preprocessor;

/// Seeded train/validation split and subsampling
pub mod splitter;

/// Appends parent-level label tokens to input sequences
pub mod augmenter;

/// Per-level sequence/label views of a dataset
pub mod dataset;

/// Index partitions for each epoch
pub mod scheduler;

/// Pads a group of sequences into one batch
pub mod batcher;
