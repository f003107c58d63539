// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Orchestrates the other layers for each CLI command.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

/// JSONL corpus -> token files
pub mod encode_use_case;

/// The training workflow
pub mod train_use_case;

/// Load a run and generate text
pub mod predict_use_case;
