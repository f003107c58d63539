// ============================================================
// Layer 5 - Key Mask Expansion
// ============================================================
// Turns the per-token padding mask (batch, seq) into the
// per-head attention mask (batch * heads, seq, seq):
//
//   (batch, seq)
//     -> unsqueeze           (batch, 1, seq)
//     -> replicate heads     (batch, heads, seq)
//     -> reshape             (batch * heads, 1, seq)
//     -> replicate queries   (batch * heads, seq, seq)
//
// Every query row of a given (batch, head) pair is identical, so
// this is a KEY mask. There is no causal triangle here: a query
// may attend to any non-padding key, including later positions.

use burn::prelude::*;
use burn::tensor::Bool;

/// Expand a {0,1} token mask into a boolean attention mask where
/// `true` marks a key that may be attended to.
pub fn expand_key_mask<B: Backend>(mask: Tensor<B, 2, Int>, heads: usize) -> Tensor<B, 3, Bool> {
    let [batch, seq_len] = mask.dims();

    mask.unsqueeze_dim::<3>(1)
        .repeat_dim(1, heads)
        .reshape([batch * heads, 1, seq_len])
        .repeat_dim(1, seq_len)
        .equal_elem(1)
}
