// ============================================================
// Layer 4 - Text Preprocessor
// ============================================================
// Normalises raw corpus text before it is chunked and encoded.
//
// Each chunk must end up on exactly one line of
// structured_data.txt, so every kind of line break is folded
// into a plain space here.
//
// Cleaning steps:
//   1. Tabs, newlines, NBSP, zero-width space, BOM and other
//      control characters become a space
//   2. Runs of spaces collapse into one
//   3. Leading and trailing whitespace is trimmed

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean `text` into a single whitespace-normalised line.
    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() || c.is_whitespace() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
