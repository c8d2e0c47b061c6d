use crate::bar::Bar;
use serde::{Deserialize, Serialize};

/// Minimum window length before the oscillator is computed.
pub const SMI_MIN_BARS: usize = 20;
/// Stochastic lookback.
pub const SMI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Smi {
    pub value: f64,
    pub signal: f64,
}

/// Fast stochastic %K standing in for the SMI.
///
/// This is an approximation: a true SMI double-smooths the close's distance from the
/// range midpoint, whereas here `value` and `signal` both carry the raw 14-bar %K.
/// A flat 14-bar range yields 50. Fewer than 20 bars gives `{0, 0}`.
pub fn calculate_smi(bars: &[Bar]) -> Smi {
    if bars.len() < SMI_MIN_BARS {
        return Smi::default();
    }

    let subset = &bars[bars.len() - SMI_PERIOD..];
    let min_low = subset.iter().map(|bar| bar.low).fold(f64::INFINITY, f64::min);
    let max_high = subset.iter().map(|bar| bar.high).fold(f64::NEG_INFINITY, f64::max);
    let current = subset[subset.len() - 1].close;

    let range = max_high - min_low;
    let k = if range > 0.0 {
        (current - min_low) / range * 100.0
    } else {
        50.0
    };

    Smi { value: k, signal: k }
}
