/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Trailing mean at every position over the last `window` values,
/// shrinking at the start of the series (minimum window of 1).
pub fn trailing_means(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            mean(&values[start..=i])
        })
        .collect()
}

/// Rounds to the nearest integer, halves to even.
pub fn round_to_int(value: f64) -> i64 {
    value.round_ties_even() as i64
}
