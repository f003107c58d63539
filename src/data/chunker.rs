// ============================================================
// Layer 4 - Character Window Chunker
// ============================================================
// Cuts the joined corpus into consecutive, non-overlapping
// windows of `context_window` characters:
//
//   context_window = 4
//   "abcdefghij"  ->  "abcd" | "efgh" | "ij"
//
// Windows are counted in chars, not bytes, so multi-byte UTF-8
// text is never split inside a code point. Each window is
// trimmed; windows that are only whitespace are dropped.

pub struct Chunker {
    context_window: usize,
}

impl Chunker {
    /// # Panics
    /// Panics if `context_window` is zero.
    pub fn new(context_window: usize) -> Self {
        assert!(context_window > 0, "context_window must be positive");
        Self { context_window }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();

        chars
            .chunks(self.context_window)
            .map(|w| w.iter().collect::<String>().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect()
    }
}
