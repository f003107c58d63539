// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Persistence used by several other layers:
//
//   checkpoint.rs      - runs/version_N directories: hparams.json,
//                        CompactRecorder weights per epoch and
//                        the latest-epoch pointer
//
//   tokenizer_store.rs - HuggingFace tokenizer behind the
//                        TextTokenizer trait; builds a word-level
//                        vocabulary when none is supplied
//
//   metrics.rs         - per-epoch CSV (loss, lr, step count)

/// Versioned run directories and model checkpoints
pub mod checkpoint;

/// Tokenizer loading and word-level building
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
