// ============================================================
// Layer 3 - Core Error Type
// ============================================================
// Failure modes of the model core. Application code wraps these
// in anyhow::Error with extra context; tests match on variants.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmError {
    /// Empty prompt, or a prompt the tokenizer turns into nothing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A hyperparameter or sampling setting that can never be valid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loss mask selected zero positions.
    #[error("attention mask selects no positions; refusing to compute a loss over nothing")]
    EmptyMask,

    /// Input is longer than the positional table.
    #[error("sequence length {len} exceeds the positional table capacity {max_len}")]
    SequenceTooLong { len: usize, max_len: usize },

    /// A required checkpoint, hyperparameter or tokenizer file is absent.
    #[error("missing {what} at '{}'", path.display())]
    MissingArtifact { what: &'static str, path: PathBuf },

    /// The tokenizer could not encode or decode.
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),

    /// Reading tensor values back to the host failed.
    #[error("tensor data conversion failed: {0}")]
    TensorData(String),
}

pub type LmResult<T> = std::result::Result<T, LmError>;
