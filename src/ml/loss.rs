// ============================================================
// Layer 5 - Masked Language-Model Loss
// ============================================================
// Mean cross-entropy over positions where mask == 1.
//
//   logits  (seq, batch, vocab)   sequence-major model output
//   targets (batch, seq)          next-token ids
//   mask    (batch, seq)          1 = real token, 0 = padding
//
// targets and mask are transposed to sequence-major before
// flattening so that row i of the flattened logits lines up with
// element i of the flattened targets and mask.

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

use crate::domain::error::{LmError, LmResult};

pub fn masked_loss<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    mask:    Tensor<B, 2, Int>,
) -> LmResult<Tensor<B, 1>> {
    let [seq_len, batch, vocab] = logits.dims();
    if targets.dims() != [batch, seq_len] || mask.dims() != [batch, seq_len] {
        return Err(LmError::InvalidInput(format!(
            "targets {:?} and mask {:?} must both be [batch={batch}, seq={seq_len}]",
            targets.dims(),
            mask.dims()
        )));
    }

    let device  = logits.device();
    let rows    = seq_len * batch;
    let logits  = logits.reshape([rows, vocab]);
    let targets = targets.swap_dims(0, 1).reshape([rows]);
    let mask    = mask.swap_dims(0, 1).reshape([rows]);

    let kept = selected_rows(mask)?;
    if kept.is_empty() {
        return Err(LmError::EmptyMask);
    }

    let selected = kept.len();
    let index   = Tensor::<B, 1, Int>::from_data(TensorData::new(kept, [selected]), &device);
    let logits  = logits.select(0, index.clone());
    let targets = targets.select(0, index);

    let loss = CrossEntropyLossConfig::new().init(&device).forward(logits, targets);
    Ok(loss)
}

fn selected_rows<B: Backend>(mask: Tensor<B, 1, Int>) -> LmResult<Vec<i64>> {
    let values = mask
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| LmError::TensorData(format!("{e:?}")))?;

    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, m)| **m == 1)
        .map(|(i, _)| i as i64)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn int2(rows: &[&[i64]]) -> Tensor<TestBackend, 2, Int> {
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), rows[0].len()]), &Default::default())
    }

    /// (seq=2, batch=2, vocab=3)
    fn logits() -> Tensor<TestBackend, 3> {
        let values = vec![
            1.0f32, 0.0, 0.0, // s0 b0
            0.0, 2.0, 0.0,    // s0 b1
            0.0, 0.0, 3.0,    // s1 b0
            0.5, 0.5, 0.0,    // s1 b1
        ];
        Tensor::from_data(TensorData::new(values, [2, 2, 3]), &Default::default())
    }

    fn nll(row: [f32; 3], target: usize) -> f32 {
        let log_z = row.iter().map(|v| v.exp()).sum::<f32>().ln();
        log_z - row[target]
    }

    #[test]
    fn test_full_mask_is_mean_over_every_position() {
        // targets[b][s]
        let targets = int2(&[&[0, 2], &[1, 1]]);
        let mask    = int2(&[&[1, 1], &[1, 1]]);
        let loss: f32 = masked_loss(logits(), targets, mask).unwrap().into_scalar();

        let expected = (nll([1.0, 0.0, 0.0], 0)
            + nll([0.0, 0.0, 3.0], 2)
            + nll([0.0, 2.0, 0.0], 1)
            + nll([0.5, 0.5, 0.0], 1))
            / 4.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_masked_positions_are_ignored() {
        // only (b0, s1) and (b1, s0) count
        let targets = int2(&[&[1, 2], &[1, 0]]);
        let mask    = int2(&[&[0, 1], &[1, 0]]);
        let loss: f32 = masked_loss(logits(), targets, mask).unwrap().into_scalar();

        let expected = (nll([0.0, 0.0, 3.0], 2) + nll([0.0, 2.0, 0.0], 1)) / 2.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_empty_mask_is_an_error() {
        let targets = int2(&[&[0, 0], &[0, 0]]);
        let mask    = int2(&[&[0, 0], &[0, 0]]);
        let err = masked_loss(logits(), targets, mask).unwrap_err();
        assert!(matches!(err, LmError::EmptyMask));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let targets = int2(&[&[0, 0, 0]]);
        let mask    = int2(&[&[1, 1, 1]]);
        let err = masked_loss(logits(), targets, mask).unwrap_err();
        assert!(matches!(err, LmError::InvalidInput(_)));
    }
}
