// ============================================================
// Layer 4 - LM Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<LmSample>
// into three (batch, S-1) Int tensors.
//
//   [s1_t1, s1_t2, ..., s1_tL, s2_t1, ..., sN_tL]  ->  [N, L]
//
// Every sample already has length S-1 (padded in the dataset),
// so no dynamic padding is needed here.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::LmSample;

#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// (batch, S-1) input token ids
    pub inputs:  Tensor<B, 2, Int>,
    /// (batch, S-1) next-token targets
    pub targets: Tensor<B, 2, Int>,
    /// (batch, S-1) 1 = real token, 0 = padding
    pub masks:   Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack<F>(&self, items: &[LmSample], field: F) -> Tensor<B, 2, Int>
    where
        F: Fn(&LmSample) -> &[u32],
    {
        let seq_len = items.first().map_or(0, |s| field(s).len());
        let flat: Vec<i64> = items
            .iter()
            .flat_map(|s| field(s).iter().map(|&t| t as i64))
            .collect();

        Tensor::from_data(TensorData::new(flat, [items.len(), seq_len]), &self.device)
    }
}

impl<B: Backend> Batcher<LmSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmSample>) -> LmBatch<B> {
        LmBatch {
            inputs:  self.stack(&items, |s| s.input_ids.as_slice()),
            targets: self.stack(&items, |s| s.target_ids.as_slice()),
            masks:   self.stack(&items, |s| s.attention_mask.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_stacks_samples_row_major() {
        let batcher = LmBatcher::<NdArray>::new(Default::default());
        let items   = vec![
            LmSample::from_tokens(&[1, 2, 3, 4], 4, 0).unwrap(),
            LmSample::from_tokens(&[5, 6], 4, 0).unwrap(),
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.inputs.dims(), [2, 3]);

        let inputs: Vec<i64>  = batch.inputs.into_data().convert::<i64>().to_vec().unwrap();
        let targets: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        let masks: Vec<i64>   = batch.masks.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(inputs,  vec![1, 2, 3, 5, 6, 0]);
        assert_eq!(targets, vec![2, 3, 4, 6, 0, 0]);
        assert_eq!(masks,   vec![1, 1, 1, 1, 1, 0]);
    }
}
