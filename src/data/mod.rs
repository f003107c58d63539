// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// From a raw JSONL corpus to tensor batches:
//
//   corpus.jsonl
//       │
//       ▼
//   JsonlLoader       -> one Document per JSON line
//       │
//       ▼
//   Preprocessor      -> whitespace-normalised single line
//       │
//       ▼
//   Chunker           -> fixed character windows
//       │
//       ▼
//   TextTokenizer     -> space-separated ids, one chunk per line
//       │
//       ▼
//   split_tail        -> training_data.txt / validation_data.txt
//       │
//       ▼
//   TokenizedTextDataset -> shifted (input, target, mask) samples
//       │
//       ▼
//   LmBatcher         -> (batch, S-1) Int tensors
//       │
//       ▼
//   DataLoader        -> feeds batches to the training loop

/// Reads .jsonl corpora
pub mod loader;

/// Single-line whitespace normalisation
pub mod preprocessor;

/// Fixed-width character windows
pub mod chunker;

/// Encoded-file dataset implementing Burn's Dataset trait
pub mod dataset;

/// Burn Batcher for LmSample
pub mod batcher;

/// Positional train/validation split
pub mod splitter;
