// ============================================================
// Layer 5 - GPT Language Model (Burn)
// ============================================================
//   input_ids (batch, seq)
//       │  token embedding          (batch, seq, E)
//       │  + positional[:, :seq, :]  (trainable, sinusoidal init)
//       │  transpose                (seq, batch, E)
//       ▼
//   TransformerStack (N post-norm blocks, shared key mask)
//       │
//       ▼
//   x · Eᵀ  with E = embedding weight  (seq, batch, vocab)
//
// Weight tying: there is no separate output projection. The logits
// are computed directly against the embedding Param, so the two
// roles share one buffer and every optimizer update hits both.
//
// Attention is masked by padding only; there is no causal mask.
// A position can attend to later non-padding positions.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};

use crate::domain::error::{LmError, LmResult};
use crate::ml::block::TransformerStack;
use crate::ml::mask::expand_key_mask;
use crate::ml::positional::sinusoidal_encoding;

#[derive(Config, Debug)]
pub struct GptConfig {
    pub vocab_size:        usize,
    pub embed_size:        usize,
    pub num_layers:        usize,
    pub heads:             usize,
    /// Positional table length; equals the configured sequence_length
    pub max_len:           usize,
    #[config(default = 4)]
    pub forward_expansion: usize,
    #[config(default = 0.1)]
    pub dropout_rate:      f64,
}

impl GptConfig {
    pub fn validate(&self) -> LmResult<()> {
        if self.vocab_size == 0 || self.embed_size == 0 || self.max_len == 0 {
            return Err(LmError::InvalidConfig(
                "vocab_size, embed_size and max_len must all be positive".to_string(),
            ));
        }
        if self.heads == 0 || self.embed_size % self.heads != 0 {
            return Err(LmError::InvalidConfig(format!(
                "embed_size ({}) must be divisible by heads ({})",
                self.embed_size, self.heads
            )));
        }
        if self.forward_expansion == 0 {
            return Err(LmError::InvalidConfig("forward_expansion must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(LmError::InvalidConfig(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LmResult<GptModel<B>> {
        self.validate()?;

        let embedding  = EmbeddingConfig::new(self.vocab_size, self.embed_size).init(device);
        let positional = Param::from_tensor(sinusoidal_encoding(self.embed_size, self.max_len, device));
        let stack      = TransformerStack::new(
            self.num_layers,
            self.embed_size,
            self.heads,
            self.forward_expansion,
            self.dropout_rate,
            device,
        );

        Ok(GptModel {
            embedding,
            positional,
            stack,
            heads:   self.heads,
            max_len: self.max_len,
        })
    }
}

#[derive(Module, Debug)]
pub struct GptModel<B: Backend> {
    pub embedding:  Embedding<B>,
    pub positional: Param<Tensor<B, 3>>,
    pub stack:      TransformerStack<B>,
    pub heads:      usize,
    pub max_len:    usize,
}

impl<B: Backend> GptModel<B> {
    /// input_ids: (batch, seq), mask: (batch, seq) of {0,1}
    ///   -> logits (seq, batch, vocab)
    ///
    /// Sequences longer than the positional table are rejected.
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        mask:      Option<Tensor<B, 2, Int>>,
    ) -> LmResult<Tensor<B, 3>> {
        let [batch, seq_len] = input_ids.dims();
        if seq_len > self.max_len {
            return Err(LmError::SequenceTooLong { len: seq_len, max_len: self.max_len });
        }
        if let Some(mask) = &mask {
            if mask.dims() != [batch, seq_len] {
                return Err(LmError::InvalidConfig(format!(
                    "mask shape {:?} does not match input shape {:?}",
                    mask.dims(),
                    [batch, seq_len]
                )));
            }
        }

        let tokens = self.embedding.forward(input_ids); // (batch, seq, E)
        let [_, _, embed] = tokens.dims();

        let positions = self
            .positional
            .val()
            .slice([0..1, 0..seq_len, 0..embed])
            .repeat_dim(0, batch);

        let x    = (tokens + positions).swap_dims(0, 1); // (seq, batch, E)
        let mask = mask.map(|m| expand_key_mask(m, self.heads));
        let x    = self.stack.forward(x, mask);

        let logits = x
            .reshape([seq_len * batch, embed])
            .matmul(self.output_weight().transpose());

        Ok(logits.reshape([seq_len, batch, self.vocab_size()]))
    }

    /// The output projection weight, (vocab, E). Same Param as the embedding.
    pub fn output_weight(&self) -> Tensor<B, 2> {
        self.embedding.weight.val()
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.weight.val().dims()[0]
    }

    pub fn embed_size(&self) -> usize {
        self.embedding.weight.val().dims()[1]
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn device(&self) -> B::Device {
        self.embedding.weight.val().device()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> GptConfig {
        GptConfig::new(11, 8, 2, 2, 6).with_dropout_rate(0.0)
    }

    fn ids(rows: &[&[i64]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), rows[0].len()]), &Default::default())
    }

    #[test]
    fn test_logits_are_sequence_major() {
        let model  = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let logits = model.forward(ids(&[&[1, 2, 3, 4], &[5, 6, 0, 0]]), None).unwrap();
        assert_eq!(logits.dims(), [4, 2, 11]);
    }

    #[test]
    fn test_rejects_sequence_longer_than_positional_table() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let err   = model.forward(ids(&[&[1, 2, 3, 4, 5, 6, 7]]), None).unwrap_err();
        assert!(matches!(err, LmError::SequenceTooLong { len: 7, max_len: 6 }));
    }

    #[test]
    fn test_rejects_mask_shape_mismatch() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let err   = model.forward(ids(&[&[1, 2, 3]]), Some(ids(&[&[1, 1]]))).unwrap_err();
        assert!(matches!(err, LmError::InvalidConfig(_)));
    }

    #[test]
    fn test_heads_must_divide_embed_size() {
        let err = GptConfig::new(11, 10, 1, 3, 6).init::<TestBackend>(&Default::default());
        assert!(matches!(err, Err(LmError::InvalidConfig(_))));
    }

    #[test]
    fn test_output_projection_is_embedding_weight() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(model.output_weight().into_data(), model.embedding.weight.val().into_data());
    }

    #[test]
    fn test_no_separate_output_projection_parameters() {
        let config = tiny_config();
        let model  = config.init::<TestBackend>(&Default::default()).unwrap();
        let embedding  = config.vocab_size * config.embed_size;
        let positional = config.max_len * config.embed_size;
        assert_eq!(model.num_params(), embedding + positional + model.stack.num_params());
    }

    #[test]
    fn test_positional_table_starts_sinusoidal() {
        let model = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let table: Vec<f32> = model.positional.val().into_data().to_vec().unwrap();
        assert_eq!(table, crate::ml::positional::sinusoidal_table(8, 6));
    }

    #[test]
    fn test_padding_mask_changes_logits() {
        let model    = tiny_config().init::<TestBackend>(&Default::default()).unwrap();
        let input    = ids(&[&[3, 4, 5, 0]]);
        let unmasked = model.forward(input.clone(), None).unwrap();
        let masked   = model.forward(input, Some(ids(&[&[1, 1, 1, 0]]))).unwrap();
        let diff: f32 = (unmasked - masked).abs().sum().into_scalar();
        assert!(diff > 0.0);
    }
}
