// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types and traits shared by every other layer.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// One raw text record from the JSONL corpus
pub mod document;

/// Error kinds raised by the model, loss, scheduler and decoder
pub mod error;

/// Tokenizer and corpus-source abstractions
pub mod traits;
