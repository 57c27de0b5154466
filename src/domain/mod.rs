// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe the classification problem:
// category levels, encoded examples, the word/label dictionary
// and the shape of a prediction.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything above this layer (data, ml, application) speaks
// in these types, so the decoder and the scorer can be tested
// with hand-written classifiers and no tensors at all.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Category levels and the encoded train/valid/test splits
pub mod example;

// Word table, label names and augmentation tokens
pub mod dictionary;

// Top-K candidates, joint predictions and error reports
pub mod prediction;

// Core abstractions (traits) that other layers implement
pub mod traits;
