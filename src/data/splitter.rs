// ============================================================
// Layer 4 - Train/Validation Splitter
// ============================================================
// Splits encoded lines into (train, validation) by position:
// the LAST floor(len * val_ratio) lines become validation data.
//
// No shuffling; line order in the encoded file is preserved, so
// running the same split twice always gives the same files.
//
//   10 lines, val_ratio = 0.25  ->  8 train | 2 validation
//   10 lines, val_ratio = 0.05  -> 10 train | 0 validation

/// Tail split. `val_ratio` is clamped to [0, 1].
pub fn split_tail<T>(mut items: Vec<T>, val_ratio: f64) -> (Vec<T>, Vec<T>) {
    let ratio    = val_ratio.clamp(0.0, 1.0);
    let total    = items.len();
    let val_size = ((total as f64) * ratio).floor() as usize;

    let val = items.split_off(total - val_size);

    tracing::debug!("Dataset split: {} training, {} validation", items.len(), val.len());

    (items, val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_the_tail() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_tail(items, 0.2);
        assert_eq!(train, (0..8).collect::<Vec<_>>());
        assert_eq!(val,   vec![8, 9]);
    }

    #[test]
    fn test_validation_size_rounds_down() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_tail(items, 0.29);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(),   2);
    }

    #[test]
    fn test_zero_validation_keeps_everything_in_train() {
        let items: Vec<usize> = (0..9).collect();
        let (train, val)      = split_tail(items, 0.1);
        assert_eq!(train.len(), 9);
        assert!(val.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let (train, val) = split_tail(Vec::<usize>::new(), 0.5);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
