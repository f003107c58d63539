// ============================================================
// Layer 5 - Attention Block and Transformer Stack
// ============================================================
// One layer, post-norm (normalisation AFTER the residual add):
//
//   x = norm1(dropout(attention(x)) + x)
//   x = norm2(dropout(ffn(x))       + x)
//
// ffn(x) = W2 gelu(W1 x), hidden width = forward_expansion * embed
//
// The stack applies N such layers in order, handing each one the
// same expanded mask.
//
// Reference: Vaswani et al. (2017) §3.1, Hendrycks & Gimpel (2016) GELU

use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation::gelu, Bool},
};

use crate::ml::attention::SelfAttention;

#[derive(Module, Debug)]
pub struct AttentionBlock<B: Backend> {
    pub attention: SelfAttention<B>,
    pub ff_expand: Linear<B>,
    pub ff_reduce: Linear<B>,
    pub norm1:     LayerNorm<B>,
    pub norm2:     LayerNorm<B>,
    pub dropout:   Dropout,
}

impl<B: Backend> AttentionBlock<B> {
    pub fn new(
        embed_size:        usize,
        heads:             usize,
        forward_expansion: usize,
        dropout_rate:      f64,
        device:            &B::Device,
    ) -> Self {
        let hidden = forward_expansion * embed_size;
        Self {
            attention: SelfAttention::new(embed_size, heads, device),
            ff_expand: LinearConfig::new(embed_size, hidden).init(device),
            ff_reduce: LinearConfig::new(hidden, embed_size).init(device),
            norm1:     LayerNormConfig::new(embed_size).init(device),
            norm2:     LayerNormConfig::new(embed_size).init(device),
            dropout:   DropoutConfig::new(dropout_rate).init(),
        }
    }

    /// x: (seq_len, batch, embed) -> same shape
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        let attended = self.attention.forward(x.clone(), mask);
        let x = self.norm1.forward(self.dropout.forward(attended) + x);

        let fed = self.ff_reduce.forward(gelu(self.ff_expand.forward(x.clone())));
        self.norm2.forward(self.dropout.forward(fed) + x)
    }
}

#[derive(Module, Debug)]
pub struct TransformerStack<B: Backend> {
    pub layers: Vec<AttentionBlock<B>>,
}

impl<B: Backend> TransformerStack<B> {
    pub fn new(
        num_layers:        usize,
        embed_size:        usize,
        heads:             usize,
        forward_expansion: usize,
        dropout_rate:      f64,
        device:            &B::Device,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|_| AttentionBlock::new(embed_size, heads, forward_expansion, dropout_rate, device))
            .collect();
        Self { layers }
    }

    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<Tensor<B, 3, Bool>>) -> Tensor<B, 3> {
        self.layers
            .iter()
            .fold(x, |x, layer| layer.forward(x, mask.clone()))
    }
}
