use crate::bar::Bar;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Minimum window length before structure is classified.
pub const STRUCTURE_MIN_BARS: usize = 5;

/// Market structure derived from consecutive breakout closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    #[display("BULLISH")]
    Bullish,
    #[display("BEARISH")]
    Bearish,
    #[default]
    #[display("RANGING")]
    Ranging,
}

/// BULLISH when the last two closes each broke above the preceding bar's high,
/// BEARISH symmetric on lows, otherwise RANGING.
pub fn detect_swing_structure(bars: &[Bar]) -> Trend {
    if bars.len() < STRUCTURE_MIN_BARS {
        return Trend::Ranging;
    }

    let [prev2, prev, last] = [&bars[bars.len() - 3], &bars[bars.len() - 2], &bars[bars.len() - 1]];

    if last.close > prev.high && prev.close > prev2.high {
        Trend::Bullish
    } else if last.close < prev.low && prev.close < prev2.low {
        Trend::Bearish
    } else {
        Trend::Ranging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{constant_bars, rising_bars};

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar::new(0, close, high, low, close, 0.0, true)
    }

    #[test]
    fn test_structure() {
        struct TestCase {
            input: Vec<Bar>,
            expected: Trend,
        }

        let tests = vec![
            TestCase {
                // TC0: too few bars
                input: rising_bars(4, 100.0, 5.0),
                expected: Trend::Ranging,
            },
            TestCase {
                // TC1: two consecutive breakout closes
                input: rising_bars(10, 100.0, 1.0),
                expected: Trend::Bullish,
            },
            TestCase {
                // TC2: two consecutive breakdown closes
                input: rising_bars(10, 100.0, -1.0),
                expected: Trend::Bearish,
            },
            TestCase {
                // TC3: flat
                input: constant_bars(10, 100.0),
                expected: Trend::Ranging,
            },
            TestCase {
                // TC4: only the last close breaks out
                input: vec![
                    bar(10.0, 9.0, 9.5),
                    bar(10.0, 9.0, 9.5),
                    bar(10.0, 9.0, 9.5),
                    bar(10.0, 9.0, 9.8),
                    bar(11.0, 9.9, 10.5),
                ],
                expected: Trend::Ranging,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(detect_swing_structure(&test.input), test.expected, "TC{} failed", index);
        }
    }
}
