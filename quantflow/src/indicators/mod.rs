//! Indicator library
//!
//! Stateless functions over an ordered bar slice. Every call recomputes from the
//! full window; below its minimum-data threshold each indicator returns a fixed
//! safe default instead of failing.

pub mod aroon;
pub mod atr;
pub mod confluence;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod smi;
pub mod structure;

pub use aroon::{Aroon, calculate_aroon};
pub use atr::calculate_atr;
pub use confluence::{Bias, ConfluenceReport, confluence_report};
pub use ema::calculate_ema;
pub use macd::{Macd, calculate_macd};
pub use rsi::calculate_rsi;
pub use smi::{Smi, calculate_smi};
pub use structure::{Trend, detect_swing_structure};

use crate::bar::Bar;
use serde::{Deserialize, Serialize};

/// Default lookback shared by RSI, Aroon and ATR.
pub const DEFAULT_PERIOD: usize = 14;

/// Every indicator derived from one window, recomputed wholesale on each trigger.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: Macd,
    pub aroon: Aroon,
    pub smi: Smi,
    /// ATR over [`DEFAULT_PERIOD`]
    pub volatility: f64,
    pub trend: Trend,
}

/// Compose every indicator into one [`IndicatorSnapshot`].
pub fn get_indicators(bars: &[Bar]) -> IndicatorSnapshot {
    IndicatorSnapshot {
        rsi: calculate_rsi(bars, DEFAULT_PERIOD),
        macd: calculate_macd(bars),
        aroon: calculate_aroon(bars, DEFAULT_PERIOD),
        smi: calculate_smi(bars),
        volatility: calculate_atr(bars, DEFAULT_PERIOD),
        trend: detect_swing_structure(bars),
    }
}

/// Closing prices of a bar slice.
pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|bar| bar.close).collect()
}
