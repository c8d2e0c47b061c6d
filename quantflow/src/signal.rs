//! Signal decision engine
//!
//! Maps one [`IndicatorSnapshot`] and the trailing [`Bar`] to an [`AnalysisResult`]
//! using a fixed first-match-wins decision table.

use crate::{
    bar::Bar,
    indicators::{IndicatorSnapshot, Trend},
};
use chrono::Utc;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence of a strong signal before the extreme bonus.
pub const STRONG_CONFIDENCE: u8 = 82;
/// Bonus applied when RSI is past 30 / 70.
pub const EXTREME_BONUS: u8 = 8;
/// Confidence of a trend that lacks an entry trigger.
pub const PENDING_ENTRY_CONFIDENCE: u8 = 60;
/// Confidence of a mixed reading.
pub const MIXED_CONFIDENCE: u8 = 40;
pub const MAX_CONFIDENCE: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    #[display("STRONG_BUY")]
    StrongBuy,
    #[display("STRONG_SELL")]
    StrongSell,
    #[default]
    #[display("NEUTRAL")]
    Neutral,
    #[display("WAITING")]
    Waiting,
}

impl Signal {
    /// Whether the signal leaves a marker on the series.
    pub fn is_strong(&self) -> bool {
        matches!(self, Signal::StrongBuy | Signal::StrongSell)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisResult {
    pub signal: Signal,
    /// 0..=99
    pub confidence: u8,
    pub reasoning: String,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Evaluation wall-clock time in milliseconds since the epoch
    pub timestamp: i64,
}

/// Evaluate the decision table at the current wall-clock time.
pub fn analyze(snapshot: &IndicatorSnapshot, last_bar: &Bar) -> AnalysisResult {
    decide(snapshot, last_bar, Utc::now().timestamp_millis())
}

/// [`analyze`] after the artificial processing latency.
///
/// The latency only delays availability; the result is a function of the inputs.
pub async fn evaluate(snapshot: IndicatorSnapshot, last_bar: Bar, latency: Duration) -> AnalysisResult {
    tokio::time::sleep(latency).await;
    analyze(&snapshot, &last_bar)
}

/// Decision table with an explicit evaluation timestamp.
pub fn decide(snapshot: &IndicatorSnapshot, last_bar: &Bar, timestamp: i64) -> AnalysisResult {
    let rsi = snapshot.rsi;
    let histogram = snapshot.macd.histogram;
    let smi = snapshot.smi;

    let oversold = rsi < 45.0 || (smi.value > smi.signal && smi.value < -20.0);
    let overbought = rsi > 55.0 || (smi.value < smi.signal && smi.value > 20.0);

    let (signal, confidence, reasoning) = match snapshot.trend {
        Trend::Bullish if histogram > 0.0 => {
            if oversold {
                let mut reasoning = String::from(
                    "STRONG BUY: Bullish Market Structure + Momentum Shift. RSI/SMI confirms entry zone.",
                );
                let mut confidence = STRONG_CONFIDENCE;
                if rsi < 30.0 {
                    confidence += EXTREME_BONUS;
                    reasoning.push_str(" (Deep Oversold)");
                }
                (Signal::StrongBuy, confidence, reasoning)
            } else {
                (
                    Signal::Neutral,
                    PENDING_ENTRY_CONFIDENCE,
                    "Bullish Trend detected, but waiting for optimal entry (Dip).".to_string(),
                )
            }
        }
        Trend::Bearish if histogram < 0.0 => {
            if overbought {
                let mut reasoning = String::from(
                    "STRONG SELL: Bearish Market Structure + Momentum Shift. RSI/SMI confirms entry zone.",
                );
                let mut confidence = STRONG_CONFIDENCE;
                if rsi > 70.0 {
                    confidence += EXTREME_BONUS;
                    reasoning.push_str(" (Deep Overbought)");
                }
                (Signal::StrongSell, confidence, reasoning)
            } else {
                (
                    Signal::Neutral,
                    PENDING_ENTRY_CONFIDENCE,
                    "Bearish Trend detected, but waiting for optimal entry (Rally).".to_string(),
                )
            }
        }
        trend => (
            Signal::Neutral,
            MIXED_CONFIDENCE,
            format!(
                "Market is {}. Indicators are mixed. Waiting for clear structure break.",
                trend.to_string().to_lowercase()
            ),
        ),
    };

    let close = last_bar.close;
    let volatility = snapshot.volatility;
    let (stop_loss, take_profit) = match signal {
        Signal::StrongBuy => (close - volatility * 2.0, close + volatility * 4.0),
        Signal::StrongSell => (close + volatility * 2.0, close - volatility * 4.0),
        Signal::Neutral | Signal::Waiting => (close * 0.98, close * 1.02),
    };

    AnalysisResult {
        signal,
        confidence: confidence.min(MAX_CONFIDENCE),
        reasoning,
        stop_loss,
        take_profit,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{
        Aroon, Macd, Smi, get_indicators,
        test_support::rising_bars,
    };

    fn snapshot(trend: Trend, histogram: f64, rsi: f64, smi: Smi) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi,
            macd: Macd {
                line: histogram,
                signal: 0.0,
                histogram,
            },
            aroon: Aroon::default(),
            smi,
            volatility: 10.0,
            trend,
        }
    }

    fn last_bar() -> Bar {
        Bar::flat(0, 1000.0, true)
    }

    #[test]
    fn test_decision_table() {
        struct TestCase {
            input: IndicatorSnapshot,
            expected_signal: Signal,
            expected_confidence: u8,
        }

        let neutral_smi = Smi::default();
        let oversold_cross = Smi { value: -30.0, signal: -40.0 };
        let overbought_cross = Smi { value: 30.0, signal: 40.0 };

        let tests = vec![
            TestCase {
                // TC0: bullish structure + momentum + rsi dip
                input: snapshot(Trend::Bullish, 1.0, 40.0, neutral_smi),
                expected_signal: Signal::StrongBuy,
                expected_confidence: 82,
            },
            TestCase {
                // TC1: deep oversold bonus
                input: snapshot(Trend::Bullish, 1.0, 25.0, neutral_smi),
                expected_signal: Signal::StrongBuy,
                expected_confidence: 90,
            },
            TestCase {
                // TC2: smi crossover from oversold substitutes for rsi
                input: snapshot(Trend::Bullish, 1.0, 60.0, oversold_cross),
                expected_signal: Signal::StrongBuy,
                expected_confidence: 82,
            },
            TestCase {
                // TC3: bullish without an entry trigger waits for a dip
                input: snapshot(Trend::Bullish, 1.0, 60.0, neutral_smi),
                expected_signal: Signal::Neutral,
                expected_confidence: 60,
            },
            TestCase {
                // TC4: bearish structure + momentum + rsi rally
                input: snapshot(Trend::Bearish, -1.0, 60.0, neutral_smi),
                expected_signal: Signal::StrongSell,
                expected_confidence: 82,
            },
            TestCase {
                // TC5: deep overbought bonus
                input: snapshot(Trend::Bearish, -1.0, 75.0, neutral_smi),
                expected_signal: Signal::StrongSell,
                expected_confidence: 90,
            },
            TestCase {
                // TC6: smi crossover from overbought substitutes for rsi
                input: snapshot(Trend::Bearish, -1.0, 50.0, overbought_cross),
                expected_signal: Signal::StrongSell,
                expected_confidence: 82,
            },
            TestCase {
                // TC7: bearish without an entry trigger waits for a rally
                input: snapshot(Trend::Bearish, -1.0, 50.0, neutral_smi),
                expected_signal: Signal::Neutral,
                expected_confidence: 60,
            },
            TestCase {
                // TC8: bullish structure against falling momentum is mixed
                input: snapshot(Trend::Bullish, -1.0, 40.0, neutral_smi),
                expected_signal: Signal::Neutral,
                expected_confidence: 40,
            },
            TestCase {
                // TC9: ranging
                input: snapshot(Trend::Ranging, 1.0, 20.0, neutral_smi),
                expected_signal: Signal::Neutral,
                expected_confidence: 40,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = decide(&test.input, &last_bar(), 0);
            assert_eq!(actual.signal, test.expected_signal, "TC{} failed", index);
            assert_eq!(actual.confidence, test.expected_confidence, "TC{} failed", index);
        }
    }

    #[test]
    fn test_reasoning_text() {
        let deep = decide(&snapshot(Trend::Bullish, 1.0, 25.0, Smi::default()), &last_bar(), 0);
        assert!(deep.reasoning.starts_with("STRONG BUY"));
        assert!(deep.reasoning.ends_with("(Deep Oversold)"));

        let rally = decide(&snapshot(Trend::Bearish, -1.0, 50.0, Smi::default()), &last_bar(), 0);
        assert!(rally.reasoning.contains("(Rally)"));

        let mixed = decide(&snapshot(Trend::Ranging, 0.0, 50.0, Smi::default()), &last_bar(), 0);
        assert_eq!(
            mixed.reasoning,
            "Market is ranging. Indicators are mixed. Waiting for clear structure break."
        );
    }

    #[test]
    fn test_risk_levels() {
        let buy = decide(&snapshot(Trend::Bullish, 1.0, 40.0, Smi::default()), &last_bar(), 0);
        assert_eq!((buy.stop_loss, buy.take_profit), (980.0, 1040.0));

        let sell = decide(&snapshot(Trend::Bearish, -1.0, 60.0, Smi::default()), &last_bar(), 0);
        assert_eq!((sell.stop_loss, sell.take_profit), (1020.0, 960.0));

        let neutral = decide(&snapshot(Trend::Ranging, 0.0, 50.0, Smi::default()), &last_bar(), 7);
        assert_eq!((neutral.stop_loss, neutral.take_profit), (1000.0 * 0.98, 1000.0 * 1.02));
        assert_eq!(neutral.timestamp, 7);
    }

    #[test]
    fn test_rising_window_waits_for_dip() {
        let bars = rising_bars(30, 100.0, 1.0);
        let snapshot = get_indicators(&bars);
        let result = analyze(&snapshot, &bars[bars.len() - 1]);

        assert_eq!(snapshot.trend, Trend::Bullish);
        assert!(snapshot.rsi > 55.0);
        assert_ne!(result.signal, Signal::StrongBuy);
        assert_eq!(result.confidence, 60);
        assert!(result.reasoning.contains("(Dip)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_waits_for_latency() {
        let start = tokio::time::Instant::now();
        let result = evaluate(
            snapshot(Trend::Ranging, 0.0, 50.0, Smi::default()),
            last_bar(),
            Duration::from_millis(300),
        )
        .await;

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(result.signal, Signal::Neutral);
    }
}
