//! Six-way confluence report
//!
//! A second, independent reading of the window built from the classic oscillator
//! definitions (Wilder smoothing, SMA signal line, TSI-based SMI, pivot structure and
//! an ATR trailing stop). It is informational only and never feeds the decision table.

use crate::{
    bar::Bar,
    indicators::{
        DEFAULT_PERIOD, Trend, atr::true_range, calculate_aroon, calculate_ema, closes,
        macd::{MACD_FAST, MACD_SIGNAL, MACD_SLOW},
    },
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

pub const SMI_LONG: usize = 20;
pub const SMI_SHORT: usize = 5;
pub const SMI_SIGNAL: usize = 5;
pub const SWING_LENGTH: usize = 50;
pub const UT_BOT_KEY: f64 = 1.0;
pub const UT_BOT_ATR_PERIOD: usize = 10;

/// Direction one component votes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
pub enum Bias {
    #[display("bullish")]
    Bullish,
    #[display("bearish")]
    Bearish,
    #[default]
    #[display("neutral")]
    Neutral,
}

impl Bias {
    /// Values within a relative `1e-9` of the reference vote neutral.
    fn from_comparison(value: f64, reference: f64) -> Self {
        let tolerance = 1e-9 * reference.abs().max(1.0);
        if value > reference + tolerance {
            Bias::Bullish
        } else if value < reference - tolerance {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

impl From<Trend> for Bias {
    fn from(trend: Trend) -> Self {
        match trend {
            Trend::Bullish => Bias::Bullish,
            Trend::Bearish => Bias::Bearish,
            Trend::Ranging => Bias::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Reading {
    pub value: f64,
    pub signal: f64,
    pub bias: Bias,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SwingStructure {
    pub last_swing_high: f64,
    pub last_swing_low: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TrailingStop {
    pub stop: f64,
    pub bias: Bias,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ConfluenceReport {
    pub rsi: Reading,
    pub macd: Reading,
    pub aroon: Reading,
    pub smi: Reading,
    pub swing: SwingStructure,
    pub ut_bot: TrailingStop,
}

impl ConfluenceReport {
    /// Votes in a fixed order: rsi, macd, aroon, smi, swing, ut bot.
    pub fn votes(&self) -> [Bias; 6] {
        [
            self.rsi.bias,
            self.macd.bias,
            self.aroon.bias,
            self.smi.bias,
            Bias::from(self.swing.trend),
            self.ut_bot.bias,
        ]
    }

    pub fn aligned_bullish(&self) -> bool {
        self.votes().iter().all(|bias| *bias == Bias::Bullish)
    }

    pub fn aligned_bearish(&self) -> bool {
        self.votes().iter().all(|bias| *bias == Bias::Bearish)
    }
}

/// Build the report, or `None` while the window is too short for every component.
pub fn confluence_report(bars: &[Bar]) -> Option<ConfluenceReport> {
    Some(ConfluenceReport {
        rsi: wilder_rsi(bars, DEFAULT_PERIOD)?,
        macd: macd_sma_signal(bars)?,
        aroon: aroon_oscillator(bars, DEFAULT_PERIOD)?,
        smi: smi_ergodic(bars)?,
        swing: swing_structure(bars, SWING_LENGTH),
        ut_bot: ut_bot(bars, UT_BOT_KEY, UT_BOT_ATR_PERIOD)?,
    })
}

/// Wilder's moving average, ie/ an EMA with `alpha = 1 / period` seeded with the first value.
pub fn rma(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 1.0 / period.max(1) as f64;
    let mut out = Vec::with_capacity(values.len());
    for &value in values {
        let next = match out.last() {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        out.push(next);
    }
    out
}

fn deltas(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2).map(|pair| pair[1].close - pair[0].close).collect()
}

/// RSI with Wilder smoothing; bullish above the 50 midline.
pub fn wilder_rsi(bars: &[Bar], period: usize) -> Option<Reading> {
    let deltas = deltas(bars);
    if deltas.is_empty() {
        return None;
    }

    let gains: Vec<f64> = deltas.iter().map(|delta| delta.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|delta| (-delta).max(0.0)).collect();
    let up = *rma(&gains, period).last()?;
    let down = *rma(&losses, period).last()?;

    let value = match (up, down) {
        (up, down) if down == 0.0 && up == 0.0 => 50.0,
        (_, down) if down == 0.0 => 100.0,
        (up, down) => 100.0 - 100.0 / (1.0 + up / down),
    };

    Some(Reading {
        value,
        signal: 50.0,
        bias: Bias::from_comparison(value, 50.0),
    })
}

/// MACD line against a simple moving average signal line.
pub fn macd_sma_signal(bars: &[Bar]) -> Option<Reading> {
    if bars.len() < MACD_SIGNAL {
        return None;
    }

    let closes = closes(bars);
    let fast = calculate_ema(&closes, MACD_FAST);
    let slow = calculate_ema(&closes, MACD_SLOW);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

    let value = *line.last()?;
    let signal = line[line.len() - MACD_SIGNAL..].iter().sum::<f64>() / MACD_SIGNAL as f64;

    Some(Reading {
        value,
        signal,
        bias: Bias::from_comparison(value, signal),
    })
}

/// `up - down` over a full `period + 1` window.
pub fn aroon_oscillator(bars: &[Bar], period: usize) -> Option<Reading> {
    if bars.len() < period + 1 {
        return None;
    }
    let value = calculate_aroon(bars, period).oscillator();
    Some(Reading {
        value,
        signal: 0.0,
        bias: Bias::from_comparison(value, 0.0),
    })
}

/// SMI ergodic: the true strength index of closes and its EMA signal line.
pub fn smi_ergodic(bars: &[Bar]) -> Option<Reading> {
    let deltas = deltas(bars);
    if deltas.is_empty() {
        return None;
    }

    let absolute: Vec<f64> = deltas.iter().map(|delta| delta.abs()).collect();
    let momentum = calculate_ema(&calculate_ema(&deltas, SMI_LONG), SMI_SHORT);
    let magnitude = calculate_ema(&calculate_ema(&absolute, SMI_LONG), SMI_SHORT);

    let tsi: Vec<f64> = momentum
        .iter()
        .zip(&magnitude)
        .map(|(m, a)| if *a == 0.0 { 0.0 } else { m / a * 100.0 })
        .collect();
    let signal_line = calculate_ema(&tsi, SMI_SIGNAL);

    let value = *tsi.last()?;
    let signal = *signal_line.last()?;
    Some(Reading {
        value,
        signal,
        bias: Bias::from_comparison(value, signal),
    })
}

/// Swing bias from closes breaking the last confirmed pivot.
///
/// A pivot at `i - length` is confirmed once `length` bars follow it. Bias stays
/// RANGING until the first break.
pub fn swing_structure(bars: &[Bar], length: usize) -> SwingStructure {
    let Some(first) = bars.first() else {
        return SwingStructure {
            last_swing_high: 0.0,
            last_swing_low: 0.0,
            trend: Trend::Ranging,
        };
    };

    let mut last_swing_high = first.high;
    let mut last_swing_low = first.low;
    let mut trend = Trend::Ranging;

    for i in length..bars.len() {
        let pivot = i - length;
        let window = &bars[pivot.saturating_sub(length)..=i];

        let window_high = window.iter().map(|bar| bar.high).fold(f64::NEG_INFINITY, f64::max);
        let window_low = window.iter().map(|bar| bar.low).fold(f64::INFINITY, f64::min);
        if bars[pivot].high == window_high {
            last_swing_high = bars[pivot].high;
        }
        if bars[pivot].low == window_low {
            last_swing_low = bars[pivot].low;
        }

        if bars[i].close > last_swing_high {
            trend = Trend::Bullish;
        }
        if bars[i].close < last_swing_low {
            trend = Trend::Bearish;
        }
    }

    SwingStructure {
        last_swing_high,
        last_swing_low,
        trend,
    }
}

/// ATR trailing stop; the bias flips when price crosses the previous stop.
pub fn ut_bot(bars: &[Bar], key: f64, atr_period: usize) -> Option<TrailingStop> {
    let first = bars.first()?;

    let mut ranges = Vec::with_capacity(bars.len());
    ranges.push(first.high - first.low);
    ranges.extend(bars.windows(2).map(|pair| true_range(&pair[1], pair[0].close)));
    let atr = rma(&ranges, atr_period);

    let mut stop = 0.0;
    let mut bias = Bias::Neutral;
    for i in 1..bars.len() {
        let price = bars[i].close;
        let prev_price = bars[i - 1].close;
        let loss = key * atr[i];
        let prev_stop = stop;

        stop = if prev_price > prev_stop && price > prev_stop {
            prev_stop.max(price - loss)
        } else if prev_price < prev_stop && price < prev_stop {
            prev_stop.min(price + loss)
        } else if price > prev_stop {
            price - loss
        } else {
            price + loss
        };

        if prev_price < prev_stop && price > prev_stop {
            bias = Bias::Bullish;
        } else if prev_price > prev_stop && price < prev_stop {
            bias = Bias::Bearish;
        }
    }

    Some(TrailingStop { stop, bias })
}
