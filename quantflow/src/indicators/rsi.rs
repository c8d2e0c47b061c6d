use crate::bar::Bar;

/// Neutral RSI returned when the window is too short.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Simple-average RSI over exactly the last `period` close-to-close transitions.
///
/// Gains and losses are summed (not Wilder-smoothed) and divided by `period`.
/// Fewer than `period + 1` bars gives [`RSI_NEUTRAL`]; no losses gives 100.
pub fn calculate_rsi(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < period + 1 {
        return RSI_NEUTRAL;
    }

    let recent = &bars[bars.len() - period - 1..];
    let (gains, losses) = recent
        .windows(2)
        .map(|pair| pair[1].close - pair[0].close)
        .fold((0.0, 0.0), |(gains, losses), diff| {
            if diff >= 0.0 {
                (gains + diff, losses)
            } else {
                (gains, losses - diff)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{constant_bars, rising_bars};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar::flat(i as i64, close, true))
            .collect()
    }

    #[test]
    fn test_rsi_insufficient_data_is_neutral() {
        assert_eq!(calculate_rsi(&rising_bars(14, 100.0, 1.0), 14), 50.0);
        assert_eq!(calculate_rsi(&[], 14), 50.0);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        assert_eq!(calculate_rsi(&rising_bars(15, 100.0, 1.0), 14), 100.0);
    }

    #[test]
    fn test_rsi_flat_is_100() {
        // Zero loss short-circuits before the ratio
        assert_eq!(calculate_rsi(&constant_bars(20, 10.0), 14), 100.0);
    }

    #[test]
    fn test_rsi_only_uses_last_period_transitions() {
        // Large drop outside the last 2 transitions must not count
        let bars = bars_from_closes(&[100.0, 50.0, 51.0, 50.0]);
        // last 2 transitions: +1, -1 => rs = 1 => 50
        assert!((calculate_rsi(&bars, 2) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_mixed() {
        // transitions: +2, -1 => avg_gain 1.0, avg_loss 0.5, rs 2 => 66.666..
        let bars = bars_from_closes(&[10.0, 12.0, 11.0]);
        assert!((calculate_rsi(&bars, 2) - 200.0 / 3.0).abs() < 1e-9);
    }
}
