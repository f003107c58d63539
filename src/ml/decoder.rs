// ============================================================
// Layer 5 - Autoregressive Decoder (temperature + nucleus)
// ============================================================
//   PROMPT_ENCODED ──► GENERATING ──(eot or budget)──► DONE
//
// Each step runs a full forward pass over the trailing `max_len`
// tokens (no KV cache), divides the last position's logits by the
// temperature, applies the top-p filter, and samples one token.
//
// `Generation::tokens` ends with the eot id when sampling stopped
// on it; `Generation::text` is decoded from the sequence without it.
//
// The RNG is always supplied by the caller.

use burn::prelude::*;
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

use crate::domain::error::{LmError, LmResult};
use crate::domain::traits::TextTokenizer;
use crate::ml::model::GptModel;

/// Anything that can score the next token of a sequence.
pub trait NextTokenLogits {
    /// Unnormalised logits over the vocabulary for the token after `tokens`.
    fn next_token_logits(&self, tokens: &[u32]) -> LmResult<Vec<f32>>;

    /// Longest window the model accepts in one forward pass.
    fn context_len(&self) -> usize;
}

impl<B: Backend> NextTokenLogits for GptModel<B> {
    fn next_token_logits(&self, tokens: &[u32]) -> LmResult<Vec<f32>> {
        if tokens.is_empty() {
            return Err(LmError::InvalidInput("cannot score an empty sequence".to_string()));
        }
        let window = &tokens[tokens.len().saturating_sub(self.max_len())..];
        let len    = window.len();
        let ids: Vec<i64> = window.iter().map(|&t| t as i64).collect();

        let input  = Tensor::<B, 2, Int>::from_data(TensorData::new(ids, [1, len]), &self.device());
        let logits = self.forward(input, None)?; // (len, 1, vocab)
        let vocab  = self.vocab_size();

        logits
            .slice([len - 1..len, 0..1, 0..vocab])
            .reshape([vocab])
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| LmError::TensorData(format!("{e:?}")))
    }

    fn context_len(&self) -> usize {
        self.max_len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub tokens:         Vec<u32>,
    pub text:           String,
    pub stopped_on_eot: bool,
}

#[derive(Debug, Clone)]
pub struct Decoder {
    temperature:    f32,
    top_p:          f32,
    max_new_tokens: Option<usize>,
}

impl Decoder {
    /// `max_new_tokens = None` generates up to the model's context length.
    pub fn new(temperature: f32, top_p: f32, max_new_tokens: Option<usize>) -> LmResult<Self> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(LmError::InvalidConfig(format!(
                "temperature must be a positive finite number, got {temperature}"
            )));
        }
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(LmError::InvalidConfig(format!("top_p must be in (0, 1], got {top_p}")));
        }
        Ok(Self { temperature, top_p, max_new_tokens })
    }

    pub fn generate<M, T, R>(
        &self,
        model:     &M,
        tokenizer: &T,
        prompt:    &str,
        rng:       &mut R,
    ) -> LmResult<Generation>
    where
        M: NextTokenLogits + ?Sized,
        T: TextTokenizer + ?Sized,
        R: Rng + ?Sized,
    {
        // ── PROMPT_ENCODED ───────────────────────────────────────────────────
        if prompt.trim().is_empty() {
            return Err(LmError::InvalidInput("prompt is empty".to_string()));
        }
        let mut sequence = tokenizer
            .encode(prompt)
            .map_err(|e| LmError::Tokenizer(format!("cannot encode prompt: {e:#}")))?;
        if sequence.is_empty() {
            return Err(LmError::InvalidInput(format!(
                "prompt {prompt:?} could not be tokenized"
            )));
        }
        tracing::debug!("Prompt encoded to {} tokens", sequence.len());

        // ── GENERATING ───────────────────────────────────────────────────────
        let budget  = self.max_new_tokens.unwrap_or_else(|| model.context_len());
        let eot     = tokenizer.eot_token();
        let mut hit = false;

        for step in 0..budget {
            let logits: Vec<f32> = model
                .next_token_logits(&sequence)?
                .into_iter()
                .map(|l| l / self.temperature)
                .collect();

            let filtered = top_p_filter(&logits, self.top_p);
            let probs    = softmax(&filtered);
            let next     = sample(&probs, rng)?;

            if next == eot {
                tracing::debug!("End-of-text reached after {step} generated tokens");
                hit = true;
                break;
            }
            tracing::debug!("step {step}: sampled token {next}");
            sequence.push(next);
        }

        // ── DONE ─────────────────────────────────────────────────────────────
        let text = tokenizer
            .decode(&sequence)
            .map_err(|e| LmError::Tokenizer(format!("cannot decode generated tokens: {e:#}")))?;
        if hit {
            sequence.push(eot);
        }
        Ok(Generation { tokens: sequence, text, stopped_on_eot: hit })
    }
}

/// Nucleus filter over raw logits. Removed entries become `-inf`.
///
/// Logits are ranked descending and the cumulative softmax is taken.
/// An entry is removed when the cumulative mass *before* it already
/// exceeds `top_p`, so the highest-ranked token always survives.
pub fn top_p_filter(logits: &[f32], top_p: f32) -> Vec<f32> {
    let mut order: Vec<usize> = (0..logits.len()).collect();
    order.sort_by(|&a, &b| logits[b].total_cmp(&logits[a]));

    let sorted: Vec<f32> = order.iter().map(|&i| logits[i]).collect();
    let probs = softmax(&sorted);

    let mut filtered   = logits.to_vec();
    let mut cumulative = 0.0f64;
    let mut remove_next = false;
    for (rank, &idx) in order.iter().enumerate() {
        if rank > 0 && remove_next {
            filtered[idx] = f32::NEG_INFINITY;
        }
        cumulative += probs[rank] as f64;
        remove_next = cumulative > top_p as f64;
    }
    filtered
}

/// Numerically stable softmax. `-inf` entries get zero probability.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn sample<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> LmResult<u32> {
    let dist = WeightedIndex::new(probs)
        .map_err(|e| LmError::InvalidInput(format!("cannot sample next token: {e}")))?;
    Ok(dist.sample(rng) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rand::{rngs::StdRng, SeedableRng};

    /// Three-token toy vocabulary: 0 = "A", 1 = "B", 2 = eot.
    struct ToyTokenizer;

    impl TextTokenizer for ToyTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text
                .split_whitespace()
                .filter_map(|w| match w {
                    "A" => Some(0),
                    "B" => Some(1),
                    _ => None,
                })
                .collect())
        }

        fn decode(&self, ids: &[u32]) -> Result<String> {
            let words: Vec<&str> = ids
                .iter()
                .map(|&i| match i {
                    0 => "A",
                    1 => "B",
                    _ => "<|endoftext|>",
                })
                .collect();
            Ok(words.join(" "))
        }

        fn eot_token(&self) -> u32 {
            2
        }

        fn vocab_size(&self) -> usize {
            3
        }
    }

    /// Always returns the same logits and records the lengths it was fed.
    struct FixedLogits {
        logits:  Vec<f32>,
        context: usize,
        seen:    std::cell::RefCell<Vec<usize>>,
    }

    impl FixedLogits {
        fn new(logits: Vec<f32>, context: usize) -> Self {
            Self { logits, context, seen: Default::default() }
        }
    }

    impl NextTokenLogits for FixedLogits {
        fn next_token_logits(&self, tokens: &[u32]) -> LmResult<Vec<f32>> {
            self.seen.borrow_mut().push(tokens.len());
            Ok(self.logits.clone())
        }

        fn context_len(&self) -> usize {
            self.context
        }
    }

    #[test]
    fn test_top_p_one_keeps_every_token() {
        let logits   = vec![1.0, 2.0, 3.0, 0.5];
        let filtered = top_p_filter(&logits, 1.0);
        assert_eq!(filtered, logits);
    }

    #[test]
    fn test_tiny_top_p_keeps_only_argmax() {
        let filtered = top_p_filter(&[1.0, 4.0, 3.0, 0.5], 1e-6);
        assert_eq!(filtered[1], 4.0);
        for i in [0, 2, 3] {
            assert_eq!(filtered[i], f32::NEG_INFINITY);
        }
    }

    #[test]
    fn test_top_p_keeps_the_token_that_crosses_the_threshold() {
        // probabilities ~ [0.665, 0.245, 0.090]
        let filtered = top_p_filter(&[2.0, 1.0, 0.0], 0.7);
        assert_eq!(filtered[0], 2.0);
        assert_eq!(filtered[1], 1.0);
        assert_eq!(filtered[2], f32::NEG_INFINITY);
    }

    #[test]
    fn test_softmax_ignores_negative_infinity() {
        let probs = softmax(&[0.0, f32::NEG_INFINITY, 0.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert_eq!(probs[1], 0.0);
    }

    #[test]
    fn test_decoder_rejects_bad_sampling_settings() {
        assert!(matches!(Decoder::new(0.0, 0.9, None), Err(LmError::InvalidConfig(_))));
        assert!(matches!(Decoder::new(-1.0, 0.9, None), Err(LmError::InvalidConfig(_))));
        assert!(matches!(Decoder::new(f32::NAN, 0.9, None), Err(LmError::InvalidConfig(_))));
        assert!(matches!(Decoder::new(1.0, 0.0, None), Err(LmError::InvalidConfig(_))));
        assert!(matches!(Decoder::new(1.0, 1.5, None), Err(LmError::InvalidConfig(_))));
    }

    #[test]
    fn test_halts_on_eot_after_one_step() {
        let model   = FixedLogits::new(vec![0.0, 0.0, 10.0], 8);
        let decoder = Decoder::new(1.0, 0.9, None).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let out = decoder.generate(&model, &ToyTokenizer, "A", &mut rng).unwrap();

        assert_eq!(out.tokens, vec![0, 2]);
        assert!(out.stopped_on_eot);
        assert_eq!(out.text, "A");
        assert_eq!(model.seen.borrow().len(), 1);
    }

    #[test]
    fn test_stops_at_token_budget_without_eot() {
        let model   = FixedLogits::new(vec![0.0, 10.0, -10.0], 8);
        let decoder = Decoder::new(1.0, 0.5, Some(3)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let out = decoder.generate(&model, &ToyTokenizer, "A", &mut rng).unwrap();

        assert_eq!(out.tokens, vec![0, 1, 1, 1]);
        assert!(!out.stopped_on_eot);
        assert_eq!(out.text, "A B B B");
        assert_eq!(*model.seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_default_budget_is_context_length() {
        let model   = FixedLogits::new(vec![0.0, 10.0, -10.0], 4);
        let decoder = Decoder::new(1.0, 0.5, None).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let out = decoder.generate(&model, &ToyTokenizer, "A B", &mut rng).unwrap();
        assert_eq!(out.tokens.len(), 2 + 4);
    }

    #[test]
    fn test_empty_prompt_is_invalid_input() {
        let model   = FixedLogits::new(vec![0.0, 0.0, 10.0], 8);
        let decoder = Decoder::new(1.0, 0.9, None).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        for prompt in ["", "   ", "zzz"] {
            let err = decoder.generate(&model, &ToyTokenizer, prompt, &mut rng).unwrap_err();
            assert!(matches!(err, LmError::InvalidInput(_)));
        }
    }

    /// Encodes fine, but cannot decode anything.
    struct MuteTokenizer;

    impl TextTokenizer for MuteTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            ToyTokenizer.encode(text)
        }

        fn decode(&self, _ids: &[u32]) -> Result<String> {
            anyhow::bail!("no decoder loaded")
        }

        fn eot_token(&self) -> u32 {
            2
        }

        fn vocab_size(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_tokenizer_failure_is_a_core_error() {
        let model   = FixedLogits::new(vec![0.0, 0.0, 10.0], 8);
        let decoder = Decoder::new(1.0, 0.9, None).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let err = decoder.generate(&model, &MuteTokenizer, "A", &mut rng).unwrap_err();
        match err {
            LmError::Tokenizer(msg) => assert!(msg.contains("no decoder loaded"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_seed_same_generation() {
        let model   = FixedLogits::new(vec![1.0, 1.0, 0.2], 16);
        let decoder = Decoder::new(1.0, 1.0, Some(10)).unwrap();

        let a = decoder.generate(&model, &ToyTokenizer, "A", &mut StdRng::seed_from_u64(42)).unwrap();
        let b = decoder.generate(&model, &ToyTokenizer, "A", &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gpt_model_scores_only_the_trailing_window() {
        use crate::ml::model::tests::tiny_config;
        use burn::backend::NdArray;

        let model  = tiny_config().init::<NdArray>(&Default::default()).unwrap();
        let long: Vec<u32> = (0..20).map(|i| i % 11).collect();
        let logits = model.next_token_logits(&long).unwrap();
        let tail   = model.next_token_logits(&long[long.len() - model.max_len()..]).unwrap();

        assert_eq!(logits.len(), 11);
        assert_eq!(logits, tail);
    }
}
