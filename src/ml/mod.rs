// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn framework code lives in this layer. The decoder,
// scorer and trainer loop only see the Classifier and
// LevelModel traits, so they are testable with plain mocks.
//
// What's in this layer:
//
//   model.rs       — Per-level text classifier
//                    • Word embeddings
//                    • LSTM or GRU encoder
//                    • Masked mean pooling over time
//                    • Dropout + linear softmax head
//
//   optim.rs       — Adadelta as a Burn SimpleOptimizer,
//                    plus the optimiser selector
//
//   trainer.rs     — Minibatch training loop with periodic
//                    validation, early stopping, checkpointing
//                    and resume
//
//   level_model.rs — Burn model + optimiser behind LevelModel
//
//   scorer.rs      — Per-level error and 3-level error profile
//
//   decoder.rs     — Top-K joint beam decoding over the 3 levels
//
//   inferencer.rs  — Loads a saved level model for decoding
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Hochreiter & Schmidhuber (1997) Long Short-Term Memory

/// Embedding + recurrent encoder + softmax head
pub mod model;

/// Adadelta optimiser and optimiser selection
pub mod optim;

/// Training loop with early stopping and checkpointing
pub mod trainer;

/// Burn implementation of the trainable level model
pub mod level_model;

/// Error rates per level and across levels
pub mod scorer;

/// Top-K joint decoding of the label path
pub mod decoder;

/// Inference engine: loads a level checkpoint
pub mod inferencer;

use burn::prelude::Backend;

/// Backend used for inference and for the inner side of training.
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend  = burn::backend::Autodiff<InferBackend>;
pub type ComputeDevice = <InferBackend as Backend>::Device;

pub fn default_device() -> ComputeDevice {
    ComputeDevice::default()
}
