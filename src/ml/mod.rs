// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// All model math lives here; layers 1-4 only hand it
// datasets and configs.
//
//   positional.rs - sinusoidal table, initial value of the
//                   trainable positional Param
//   mask.rs       - (batch, seq) padding mask -> per-head
//                   (batch*heads, seq, seq) key mask
//   attention.rs  - hand-rolled multi-head self-attention
//   block.rs      - post-norm attention block + N-layer stack
//   model.rs      - GPT model with tied output projection
//   loss.rs       - cross-entropy over unmasked positions
//   scheduler.rs  - warmup / cosine learning rate
//   trainer.rs    - AdamW step, validation, checkpoints
//   decoder.rs    - temperature + nucleus sampling
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Radford et al. (2019) GPT-2
//            Holtzman et al. (2020) nucleus sampling

pub mod positional;

pub mod mask;

pub mod attention;

pub mod block;

/// GPT language model (embedding, stack, tied projection)
pub mod model;

pub mod loss;

pub mod scheduler;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Autoregressive sampling
pub mod decoder;
