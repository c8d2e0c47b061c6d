use super::{closes, ema::calculate_ema};
use crate::bar::Bar;
use serde::{Deserialize, Serialize};

/// Fast EMA period.
pub const MACD_FAST: usize = 12;
/// Slow EMA period, also the minimum window length.
pub const MACD_SLOW: usize = 26;
/// Signal EMA period.
pub const MACD_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD(12, 26, 9) over closes, using the first-value-seeded EMA.
///
/// The signal line is the EMA(9) of the full historical MACD-line series.
/// Fewer than 26 bars gives all zeros.
pub fn calculate_macd(bars: &[Bar]) -> Macd {
    if bars.len() < MACD_SLOW {
        return Macd::default();
    }

    let closes = closes(bars);
    let ema_fast = calculate_ema(&closes, MACD_FAST);
    let ema_slow = calculate_ema(&closes, MACD_SLOW);

    let history: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal_series = calculate_ema(&history, MACD_SIGNAL);

    let line = history.last().copied().unwrap_or_default();
    let signal = signal_series.last().copied().unwrap_or_default();

    Macd {
        line,
        signal,
        histogram: line - signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{constant_bars, rising_bars};

    #[test]
    fn test_macd_insufficient_data_is_zero() {
        assert_eq!(calculate_macd(&rising_bars(25, 100.0, 1.0)), Macd::default());
    }

    #[test]
    fn test_macd_constant_series_is_zero() {
        let macd = calculate_macd(&constant_bars(40, 100.0));
        assert!(macd.line.abs() < 1e-12);
        assert!(macd.signal.abs() < 1e-12);
        assert!(macd.histogram.abs() < 1e-12);
    }

    #[test]
    fn test_macd_rising_series_positive() {
        let macd = calculate_macd(&rising_bars(30, 100.0, 1.0));
        assert!(macd.line > 0.0);
        assert!(macd.histogram > 0.0);
        assert!((macd.histogram - (macd.line - macd.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_falling_series_negative() {
        let macd = calculate_macd(&rising_bars(30, 200.0, -1.0));
        assert!(macd.line < 0.0);
        assert!(macd.histogram < 0.0);
    }
}
