// ============================================================
// Layer 3 - Document Domain Type
// ============================================================
// One record of the raw JSONL corpus. Each line of the input
// file is a JSON object; only the "text" field is used.
//
// Example line:
//   {"text": "Svelte is a UI framework...", "meta": {...}}

use serde::{Deserialize, Serialize};

/// A single text record loaded from the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// 1-based line number in the source file, kept for tracing
    #[serde(skip)]
    pub line: usize,

    /// The raw text; records without a "text" field become empty
    #[serde(default)]
    pub text: String,
}

impl Document {
    /// Parse one JSONL line. Returns None for lines that are not JSON.
    pub fn from_json_line(line: usize, raw: &str) -> Option<Self> {
        let mut doc: Document = serde_json::from_str(raw).ok()?;
        doc.line = line;
        Some(doc)
    }
}
