/// Exponential moving average over a full series.
///
/// Smoothing `k = 2/(period+1)`. The output is seeded with the first raw input value
/// rather than an SMA warm-up, so early values lean toward the first sample:
///   out[0] = v[0]
///   out[i] = v[i]·k + out[i-1]·(1−k)
///
/// Returns a series of the same length as the input; empty input gives an empty series.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);

    let mut output = Vec::with_capacity(values.len());
    let mut iter = values.iter();
    if let Some(&first) = iter.next() {
        output.push(first);
        let mut prev = first;
        for &value in iter {
            prev = value * k + prev * (1.0 - k);
            output.push(prev);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_constant_series_is_constant() {
        assert_eq!(calculate_ema(&[5.0, 5.0, 5.0, 5.0], 3), vec![5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        // k = 0.5
        let ema = calculate_ema(&[10.0, 11.0, 12.0, 13.0], 3);
        let expected = [10.0, 10.5, 11.25, 12.125];

        assert_eq!(ema.len(), expected.len());
        for (index, (actual, expected)) in ema.iter().zip(expected).enumerate() {
            assert!((actual - expected).abs() < 1e-10, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ema_empty() {
        assert!(calculate_ema(&[], 9).is_empty());
    }
}
