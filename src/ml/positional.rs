// ============================================================
// Layer 5 - Sinusoidal Positional Encoding
// ============================================================
// Builds the (1, max_len, embed_size) table
//
//   P[0, pos, 2i]   = sin(pos / 10000^(2i/E))
//   P[0, pos, 2i+1] = cos(pos / 10000^(2i/E))
//
// The model wraps the result in a Param, so this is only the
// initial value; training is free to move it afterwards.
//
// Reference: Vaswani et al. (2017) §3.5

use burn::prelude::*;

/// Row-major host copy of the table, `max_len * embed_size` values.
pub fn sinusoidal_table(embed_size: usize, max_len: usize) -> Vec<f32> {
    let mut table = vec![0.0f32; max_len * embed_size];
    let log_base = -(10000.0f64).ln() / embed_size as f64;

    for pos in 0..max_len {
        let row = &mut table[pos * embed_size..(pos + 1) * embed_size];
        for even in (0..embed_size).step_by(2) {
            let angle = pos as f64 * (even as f64 * log_base).exp();
            row[even] = angle.sin() as f32;
            if even + 1 < embed_size {
                row[even + 1] = angle.cos() as f32;
            }
        }
    }
    table
}

/// The table as a `[1, max_len, embed_size]` tensor on `device`.
pub fn sinusoidal_encoding<B: Backend>(
    embed_size: usize,
    max_len:    usize,
    device:     &B::Device,
) -> Tensor<B, 3> {
    let data = TensorData::new(sinusoidal_table(embed_size, max_len), [1, max_len, embed_size]);
    Tensor::from_data(data, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_shape_is_one_by_len_by_embed() {
        let device = Default::default();
        for (embed, len) in [(4, 1), (8, 16), (6, 3)] {
            let pe = sinusoidal_encoding::<TestBackend>(embed, len, &device);
            assert_eq!(pe.dims(), [1, len, embed]);
        }
    }

    #[test]
    fn test_even_columns_sin_odd_columns_cos() {
        let (embed, len) = (8, 10);
        let table = sinusoidal_table(embed, len);
        for pos in 0..len {
            for i in 0..embed / 2 {
                let freq  = 1.0 / 10000f64.powf((2 * i) as f64 / embed as f64);
                let angle = pos as f64 * freq;
                let sin   = table[pos * embed + 2 * i] as f64;
                let cos   = table[pos * embed + 2 * i + 1] as f64;
                assert!((sin - angle.sin()).abs() < 1e-5, "sin mismatch at pos={pos} i={i}");
                assert!((cos - angle.cos()).abs() < 1e-5, "cos mismatch at pos={pos} i={i}");
            }
        }
    }

    #[test]
    fn test_position_zero_is_alternating_zero_one() {
        let table = sinusoidal_table(6, 2);
        assert_eq!(&table[0..6], &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_odd_embed_size_ends_with_sin_column() {
        let table = sinusoidal_table(5, 3);
        // pos 1, last column (index 4) is sin(1 / 10000^(4/5))
        let expected = (1.0f64 / 10000f64.powf(4.0 / 5.0)).sin();
        assert!((table[5 + 4] as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(sinusoidal_table(16, 32), sinusoidal_table(16, 32));
    }
}
