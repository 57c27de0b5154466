// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training the three levels, or decoding a
// finished run).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Files are touched only through Layer 4 and Layer 6 types,
//     except the run-level JSON outputs
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The three-level training workflow
pub mod train_use_case;

// Joint decoding and hard-vs-soft scoring
pub mod decode_use_case;
