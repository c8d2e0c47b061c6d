//! Bounded, time-ordered bar window
//!
//! Holds at most `max_bars` bars strictly ascending by `time`, with at most one
//! trailing forming bar: appending a newer bar seals the one it supersedes.
//! Oldest bars are evicted first.

use crate::bar::Bar;
use std::collections::VecDeque;

/// Outcome of merging one bar event into the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowChange {
    /// Trailing bar with the same timestamp was replaced
    Updated(Bar),
    /// Bar was appended; `evicted` oldest bars were dropped to respect the cap
    Appended { bar: Bar, evicted: usize },
    /// Bar was older than the trailing bar and has been discarded
    Discarded,
}

impl WindowChange {
    /// Whether the window contents changed.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, WindowChange::Discarded)
    }
}

/// Ring buffer of the most recent bars.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<Bar>,
    max_bars: usize,
}

impl BarWindow {
    pub fn new(max_bars: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_bars),
            max_bars,
        }
    }

    /// Replace the whole window with a history batch.
    ///
    /// Input order is not trusted: bars are sorted, duplicates by timestamp keep the
    /// last occurrence, and only the newest `max_bars` are retained. Returns the number
    /// of bars loaded.
    pub fn load(&mut self, mut bars: Vec<Bar>) -> usize {
        bars.sort_by_key(|bar| bar.time);

        self.bars.clear();
        for bar in bars {
            match self.bars.back_mut() {
                Some(last) if last.time == bar.time => *last = bar,
                _ => self.bars.push_back(bar),
            }
        }

        let excess = self.bars.len().saturating_sub(self.max_bars);
        self.bars.drain(..excess);
        self.bars.len()
    }

    /// Merge one bar event.
    pub fn apply(&mut self, bar: Bar) -> WindowChange {
        if let Some(last) = self.bars.back_mut() {
            if bar.time == last.time {
                *last = bar;
                return WindowChange::Updated(bar);
            }
            if bar.time < last.time {
                return WindowChange::Discarded;
            }
            // A superseded forming bar is sealed as-is
            last.is_closed = true;
        }

        self.bars.push_back(bar);
        let mut evicted = 0;
        while self.bars.len() > self.max_bars {
            self.bars.pop_front();
            evicted += 1;
        }
        WindowChange::Appended { bar, evicted }
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn max_bars(&self) -> usize {
        self.max_bars
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Most recent close price.
    pub fn last_close(&self) -> Option<f64> {
        self.bars.back().map(|bar| bar.close)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// Contiguous view of the window for the indicator library.
    pub fn as_slice(&mut self) -> &[Bar] {
        self.bars.make_contiguous()
    }

    /// Owned copy of the window for publishing.
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, close: f64, is_closed: bool) -> Bar {
        Bar::flat(time, close, is_closed)
    }

    fn assert_invariants(window: &BarWindow) {
        let bars = window.to_vec();
        assert!(bars.len() <= window.max_bars());
        assert!(bars.windows(2).all(|w| w[0].time < w[1].time), "window not strictly ascending");
        assert!(bars.iter().rev().skip(1).all(|b| b.is_closed), "superseded bar left forming");
    }

    #[test]
    fn test_load_sorts_dedupes_and_caps() {
        let mut window = BarWindow::new(3);

        let loaded = window.load(vec![
            bar(5, 5.0, true),
            bar(1, 1.0, true),
            bar(3, 3.0, true),
            bar(3, 3.5, true),
            bar(4, 4.0, true),
            bar(2, 2.0, true),
        ]);

        assert_eq!(loaded, 3);
        let times: Vec<_> = window.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![3, 4, 5]);
        assert_eq!(window.iter().next().map(|b| b.close), Some(3.5));
        assert_invariants(&window);
    }

    #[test]
    fn test_apply_updates_appends_and_discards() {
        let mut window = BarWindow::new(10);
        window.load(vec![bar(1, 1.0, true), bar(2, 2.0, false)]);

        struct TestCase {
            input: Bar,
            expected: WindowChange,
        }

        let tests = vec![
            TestCase {
                // TC0: same timestamp as trailing bar replaces it
                input: bar(2, 2.5, false),
                expected: WindowChange::Updated(bar(2, 2.5, false)),
            },
            TestCase {
                // TC1: newer timestamp appends
                input: bar(3, 3.0, false),
                expected: WindowChange::Appended { bar: bar(3, 3.0, false), evicted: 0 },
            },
            TestCase {
                // TC2: superseded timestamp is discarded
                input: bar(2, 9.0, true),
                expected: WindowChange::Discarded,
            },
            TestCase {
                // TC3: much older timestamp is discarded
                input: bar(1, 9.0, true),
                expected: WindowChange::Discarded,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = window.apply(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }

        let closes: Vec<_> = window.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.5, 3.0]);
    }

    #[test]
    fn test_apply_evicts_oldest_first() {
        let mut window = BarWindow::new(3);

        for i in 0..5 {
            window.apply(bar(i, i as f64, true));
        }

        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().next().map(|b| b.time), Some(2));
        assert_eq!(window.last_close(), Some(4.0));
        assert_invariants(&window);
    }

    #[test]
    fn test_apply_on_empty_window_appends() {
        let mut window = BarWindow::new(3);
        let change = window.apply(bar(7, 1.0, false));
        assert!(matches!(change, WindowChange::Appended { evicted: 0, .. }));
        assert!(change.is_mutation());
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_invariants_hold_for_arbitrary_event_sequence() {
        let mut window = BarWindow::new(50);
        // Deterministic pseudo-random jitter over timestamps, including repeats and regressions
        let mut state: i64 = 17;
        let mut time: i64 = 1_000;
        for _ in 0..1_000 {
            state = (state * 1_103_515_245 + 12_345) % 2_147_483_648;
            let step = state % 5 - 2;
            time = (time + step).max(0);
            window.apply(bar(time, time as f64, step != 0));
            assert_invariants(&window);
        }
    }
}
