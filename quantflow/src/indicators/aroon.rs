use crate::bar::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Aroon {
    pub up: f64,
    pub down: f64,
}

impl Aroon {
    /// `up - down`, positive while highs are more recent than lows.
    pub fn oscillator(&self) -> f64 {
        self.up - self.down
    }
}

/// Aroon up/down over the last `period + 1` bars.
///
/// Extremes are located by their *last* occurrence, so ties resolve toward the most
/// recent bar. Fewer than `period` bars gives `{0, 0}`.
pub fn calculate_aroon(bars: &[Bar], period: usize) -> Aroon {
    if period == 0 || bars.len() < period {
        return Aroon::default();
    }

    let relevant = &bars[bars.len().saturating_sub(period + 1)..];

    let high_index = last_extreme_index(relevant.iter().map(|bar| bar.high), |candidate, best| candidate >= best);
    let low_index = last_extreme_index(relevant.iter().map(|bar| bar.low), |candidate, best| candidate <= best);

    let steps_since_high = period as f64 - high_index as f64;
    let steps_since_low = period as f64 - low_index as f64;

    Aroon {
        up: (period as f64 - steps_since_high) / period as f64 * 100.0,
        down: (period as f64 - steps_since_low) / period as f64 * 100.0,
    }
}

/// Index of the last value for which `replaces(value, best)` held while scanning.
fn last_extreme_index(values: impl Iterator<Item = f64>, replaces: impl Fn(f64, f64) -> bool) -> usize {
    let mut best_index = 0;
    let mut best = f64::NAN;
    for (index, value) in values.enumerate() {
        if best.is_nan() || replaces(value, best) {
            best = value;
            best_index = index;
        }
    }
    best_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{constant_bars, rising_bars};

    fn bars_from_high_low(pairs: &[(f64, f64)]) -> Vec<Bar> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Bar::new(i as i64, low, high, low, high, 0.0, true))
            .collect()
    }

    #[test]
    fn test_aroon_insufficient_data() {
        assert_eq!(calculate_aroon(&rising_bars(13, 100.0, 1.0), 14), Aroon::default());
    }

    #[test]
    fn test_aroon_rising_highs_up_is_100() {
        let aroon = calculate_aroon(&rising_bars(40, 100.0, 1.0), 14);
        assert_eq!(aroon.up, 100.0);
        // Lowest low is the oldest bar of the 15-bar slice
        assert_eq!(aroon.down, 0.0);
        assert_eq!(aroon.oscillator(), 100.0);
    }

    #[test]
    fn test_aroon_ties_resolve_to_most_recent() {
        // Constant prices: every bar ties, the last one wins for both extremes
        let aroon = calculate_aroon(&constant_bars(20, 5.0), 14);
        assert_eq!(aroon.up, 100.0);
        assert_eq!(aroon.down, 100.0);
    }

    #[test]
    fn test_aroon_exactly_period_bars() {
        // 4 bars, period 4: slice holds only 4 bars so the newest index is 3 => 75
        let bars = bars_from_high_low(&[(1.0, 0.5), (2.0, 0.4), (3.0, 0.3), (4.0, 0.2)]);
        let aroon = calculate_aroon(&bars, 4);
        assert_eq!(aroon.up, 75.0);
        assert_eq!(aroon.down, 75.0);
    }

    #[test]
    fn test_aroon_mid_window_extreme() {
        // period 4 => 5-bar slice; high at index 2 => up = 2/4*100, low at index 0 => 0
        let bars = bars_from_high_low(&[(1.0, 0.1), (2.0, 0.5), (9.0, 0.6), (3.0, 0.7), (2.0, 0.8)]);
        let aroon = calculate_aroon(&bars, 4);
        assert_eq!(aroon.up, 50.0);
        assert_eq!(aroon.down, 0.0);
    }
}
