// ============================================================
// Layer 5 - Masked Multi-Head Self-Attention
// ============================================================
// Scaled dot-product attention over a sequence-major input
// (seq_len, batch, embed). The optional mask is the expanded key
// mask from ml::mask, shape (batch * heads, seq_len, seq_len),
// with `true` = may attend.
//
//   scores  = Q Kᵀ / sqrt(d_head)
//   scores  = fill(scores, !mask, -1e9)
//   weights = softmax(scores)
//   out     = W_o (weights V)
//
// No dropout on the weights; the block applies dropout to this
// sublayer's output.
//
// Reference: Vaswani et al. (2017) §3.2

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{activation::softmax, Bool},
};

/// Large negative score for masked keys. Finite so a row with every
/// key masked softmaxes to a uniform distribution instead of NaN.
const MASKED_SCORE: f32 = -1.0e9;

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    query:    Linear<B>,
    key:      Linear<B>,
    value:    Linear<B>,
    output:   Linear<B>,
    heads:    usize,
    head_dim: usize,
}

impl<B: Backend> SelfAttention<B> {
    pub fn new(embed_size: usize, heads: usize, device: &B::Device) -> Self {
        assert!(
            heads > 0 && embed_size % heads == 0,
            "embed_size ({embed_size}) must be divisible by heads ({heads})"
        );
        Self {
            query:    LinearConfig::new(embed_size, embed_size).init(device),
            key:      LinearConfig::new(embed_size, embed_size).init(device),
            value:    LinearConfig::new(embed_size, embed_size).init(device),
            output:   LinearConfig::new(embed_size, embed_size).init(device),
            heads,
            head_dim: embed_size / heads,
        }
    }

    /// x: (seq_len, batch, embed) -> (seq_len, batch, embed)
    ///
    /// # Panics
    /// If the mask is not (batch * heads, seq_len, seq_len).
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        let [seq_len, batch, embed] = x.dims();
        let x = x.swap_dims(0, 1); // (batch, seq, embed)

        let q = self.split_heads(self.query.forward(x.clone()), batch, seq_len);
        let k = self.split_heads(self.key.forward(x.clone()), batch, seq_len);
        let v = self.split_heads(self.value.forward(x), batch, seq_len);

        let scale  = (self.head_dim as f64).sqrt();
        let scores = q.matmul(k.swap_dims(2, 3)).div_scalar(scale); // (batch, heads, seq, seq)

        let scores = match mask {
            Some(mask) => {
                assert_eq!(
                    mask.dims(),
                    [batch * self.heads, seq_len, seq_len],
                    "attention mask shape does not match input (seq_len={seq_len}, batch={batch}, heads={})",
                    self.heads,
                );
                let keep = mask.reshape([batch, self.heads, seq_len, seq_len]);
                scores.mask_fill(keep.bool_not(), MASKED_SCORE)
            }
            None => scores,
        };

        let weights = softmax(scores, 3);
        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq_len, embed]);

        self.output.forward(context).swap_dims(0, 1)
    }

    /// (batch, seq, embed) -> (batch, heads, seq, head_dim)
    fn split_heads(&self, x: Tensor<B, 3>, batch: usize, seq_len: usize) -> Tensor<B, 4> {
        x.reshape([batch, seq_len, self.heads, self.head_dim]).swap_dims(1, 2)
    }
}
