// ============================================================
// Layer 4 - JSONL Corpus Loader
// ============================================================
// Reads a JSON-lines corpus, one object per line:
//
//   {"text": "first record ..."}
//   {"text": "second record ...", "source": "docs/intro.md"}
//
// Only the "text" field is kept. Lines that are not valid JSON
// are skipped with a warning; a missing file is an error.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::document::Document;
use crate::domain::traits::DocumentSource;

/// Loads every record of a .jsonl file.
pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read corpus '{}'", self.path.display()))?;

        let mut docs    = Vec::new();
        let mut skipped = 0usize;

        for (i, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Document::from_json_line(i + 1, line) {
                Some(doc) => docs.push(doc),
                None => {
                    skipped += 1;
                    tracing::warn!("Skipping undecodable line {} of '{}'", i + 1, self.path.display());
                }
            }
        }

        tracing::info!(
            "Loaded {} records from '{}' ({} skipped)",
            docs.len(),
            self.path.display(),
            skipped
        );
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_text_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"text": "alpha"}}"#).unwrap();
        writeln!(file, "{{broken").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text": "beta", "id": 2}}"#).unwrap();

        let docs = JsonlLoader::new(file.path()).load_all().unwrap();
        let text: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(text, vec!["alpha", "beta"]);
        assert_eq!(docs[1].line, 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlLoader::new(dir.path().join("absent.jsonl")).load_all().is_err());
    }
}
