// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by the training and decoding
// workflows:
//
//   checkpoint.rs      — Per-level checkpoint directories
//                        Burn records for parameters and
//                        optimiser state, JSON for configs,
//                        trainer state and error history.
//
//   tokenizer_store.rs — Vocabulary persistence
//                        Writes the dictionary and a WordLevel
//                        tokenizer built from it, so training
//                        and decoding map words to the same ids.
//
//   metrics.rs         — Validation history logging
//                        One CSV row per validation pass.
//
//   interrupt.rs       — Ctrl-C handling
//                        A shared flag the trainer polls
//                        between epochs.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Per-level checkpoint saving and loading
pub mod checkpoint;

/// Dictionary and tokenizer persistence
pub mod tokenizer_store;

/// Validation history CSV logger
pub mod metrics;

/// Ctrl-C cancel flag
pub mod interrupt;
