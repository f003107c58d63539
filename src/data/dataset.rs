// ============================================================
// Layer 4 - Tokenized Text Dataset
// ============================================================
// Each non-blank line of an encoded file is one sample,
// written as space-separated token ids:
//
//   "464 3290 318 257 1332"
//
// get(i) turns line i into (input, target, mask) with a fixed
// sequence_length S:
//
//   1. pad right with padding_token up to S, or truncate to S
//   2. mask[j] = 1 if seq[j] != padding_token else 0
//   3. input = seq[0..S-1], target = seq[1..S], mask = mask[0..S-1]
//
// Two storage modes:
//   InMemory - every line parsed once, up front
//   Indexed  - only byte offset and length of each line are
//              kept; lines are re-read from disk on every get()
// Both modes parse every line when the file is opened, so a
// malformed file fails at startup and not mid-epoch.
//
// An indexed re-read that fails, or that finds a line of a
// different length than at open time, panics with the path and
// sample index. Dataset::get has no error channel and a None
// would end the epoch early.

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::domain::error::{LmError, LmResult};

/// One shifted next-token training sample, all three of length S-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmSample {
    pub input_ids:      Vec<u32>,
    pub target_ids:     Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl LmSample {
    pub fn from_tokens(tokens: &[u32], sequence_length: usize, padding_token: u32) -> LmResult<Self> {
        if sequence_length < 2 {
            return Err(LmError::InvalidConfig(format!(
                "sequence_length must be at least 2, got {sequence_length}"
            )));
        }

        let mut seq: Vec<u32> = tokens.iter().copied().take(sequence_length).collect();
        seq.resize(sequence_length, padding_token);

        let mask: Vec<u32> = seq.iter().map(|&t| u32::from(t != padding_token)).collect();

        Ok(Self {
            input_ids:      seq[..sequence_length - 1].to_vec(),
            target_ids:     seq[1..].to_vec(),
            attention_mask: mask[..sequence_length - 1].to_vec(),
        })
    }
}

/// Parse one encoded line. Blank lines give an empty Vec.
pub fn parse_token_line(line: &str) -> LmResult<Vec<u32>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<u32>()
                .map_err(|_| LmError::InvalidInput(format!("'{tok}' is not a token id")))
        })
        .collect()
}

/// `max token id + 1` over every line of an encoded file.
pub fn find_vocab_size(path: impl AsRef<Path>) -> Result<usize> {
    let path   = path.as_ref();
    let file   = File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))?;
    let mut max: Option<u32> = None;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line   = line?;
        let tokens = parse_token_line(&line)
            .with_context(|| format!("{}:{}", path.display(), i + 1))?;
        max = tokens.into_iter().chain(max).max();
    }

    Ok(max.map_or(0, |m| m as usize + 1))
}

/// Byte position of one non-blank line, as seen by `open`.
#[derive(Debug, Clone, Copy)]
struct LineSpan {
    offset: u64,
    len:    usize,
}

enum Storage {
    InMemory(Vec<Vec<u32>>),
    Indexed(Vec<LineSpan>),
}

pub struct TokenizedTextDataset {
    path:            PathBuf,
    sequence_length: usize,
    padding_token:   u32,
    storage:         Storage,
    max_token:       Option<u32>,
}

impl TokenizedTextDataset {
    pub fn open(
        path:            impl Into<PathBuf>,
        sequence_length: usize,
        padding_token:   u32,
        in_memory:       bool,
    ) -> Result<Self> {
        let path = path.into();
        if sequence_length < 2 {
            return Err(LmError::InvalidConfig(format!(
                "sequence_length must be at least 2, got {sequence_length}"
            ))
            .into());
        }

        let file       = File::open(&path)
            .with_context(|| format!("Cannot open dataset '{}'", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut lines     = Vec::new();
        let mut spans     = Vec::new();
        let mut max_token = None;
        let mut offset    = 0u64;
        let mut buf       = String::new();
        let mut line_no   = 0usize;

        loop {
            buf.clear();
            let read = reader.read_line(&mut buf)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let tokens = parse_token_line(&buf)
                .with_context(|| format!("{}:{}", path.display(), line_no))?;
            if !tokens.is_empty() {
                max_token = tokens.iter().copied().chain(max_token).max();
                if in_memory {
                    lines.push(tokens);
                } else {
                    spans.push(LineSpan { offset, len: read });
                }
            }
            offset += read as u64;
        }

        let storage = if in_memory { Storage::InMemory(lines) } else { Storage::Indexed(spans) };
        let dataset = Self { path, sequence_length, padding_token, storage, max_token };

        tracing::info!(
            "Opened dataset '{}': {} samples ({} mode)",
            dataset.path.display(),
            dataset.len(),
            if in_memory { "in-memory" } else { "indexed" },
        );
        Ok(dataset)
    }

    /// Largest token id seen in the file, if any.
    pub fn max_token(&self) -> Option<u32> {
        self.max_token
    }

    fn read_span(&self, span: LineSpan) -> Result<Vec<u32>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(span.offset))?;
        let mut line = String::new();
        let read     = BufReader::new(file).read_line(&mut line)?;
        if read != span.len {
            anyhow::bail!(
                "read {read} bytes at offset {}, expected {}; the file changed after it was opened",
                span.offset,
                span.len
            );
        }
        Ok(parse_token_line(&line)?)
    }

    fn tokens(&self, index: usize) -> Option<Vec<u32>> {
        match &self.storage {
            Storage::InMemory(lines) => lines.get(index).cloned(),
            Storage::Indexed(spans) => {
                let span   = *spans.get(index)?;
                let tokens = self.read_span(span).unwrap_or_else(|e| {
                    panic!("Cannot re-read sample {index} of '{}': {e:#}", self.path.display())
                });
                Some(tokens)
            }
        }
    }
}

impl Dataset<LmSample> for TokenizedTextDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        let tokens = self.tokens(index)?;
        LmSample::from_tokens(&tokens, self.sequence_length, self.padding_token).ok()
    }

    fn len(&self) -> usize {
        match &self.storage {
            Storage::InMemory(lines)  => lines.len(),
            Storage::Indexed(spans)   => spans.len(),
        }
    }
}
