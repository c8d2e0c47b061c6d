//! Synchronous core of the manager: the window, derived outputs and the
//! debounce/single-flight rules. Owned exclusively by the manager event loop.

use crate::{
    bar::Bar,
    indicators::{IndicatorSnapshot, get_indicators},
    signal::{AnalysisResult, Signal},
    window::{BarWindow, WindowChange},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Operating mode of the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    #[display("LOADING")]
    Loading,
    #[display("LIVE")]
    Live,
    #[display("SIMULATION")]
    Simulation,
}

/// A strong signal pinned to the bar it was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Marker {
    pub time: i64,
    pub signal: Signal,
}

#[derive(Debug, Clone)]
pub struct MarketState {
    pub mode: Mode,
    pub window: BarWindow,
    pub indicators: Option<IndicatorSnapshot>,
    pub analysis: Option<AnalysisResult>,
    pub markers: Vec<Marker>,
    pub last_price: Option<f64>,
    pub analyzing: bool,
    min_bars_for_indicators: usize,
}

impl MarketState {
    pub fn new(max_bars: usize, min_bars_for_indicators: usize) -> Self {
        Self {
            mode: Mode::Loading,
            window: BarWindow::new(max_bars),
            indicators: None,
            analysis: None,
            markers: Vec::new(),
            last_price: None,
            analyzing: false,
            min_bars_for_indicators,
        }
    }

    /// Forget everything about the previous selection and re-enter LOADING.
    pub fn reset(&mut self) {
        self.mode = Mode::Loading;
        self.window.clear();
        self.indicators = None;
        self.analysis = None;
        self.markers.clear();
        self.last_price = None;
        self.analyzing = false;
    }

    /// Load a history batch and enter `mode`. Returns the number of bars kept.
    pub fn load(&mut self, bars: Vec<Bar>, mode: Mode) -> usize {
        let loaded = self.window.load(bars);
        self.last_price = self.window.last_close();
        self.mode = mode;
        loaded
    }

    /// Merge one bar event into the window.
    pub fn apply(&mut self, bar: Bar) -> WindowChange {
        let change = self.window.apply(bar);
        if change.is_mutation() {
            self.last_price = Some(bar.close);
        }
        change
    }

    /// Recompute indicators once the window holds more than the minimum bar count.
    pub fn recompute(&mut self) -> Option<IndicatorSnapshot> {
        if self.window.len() <= self.min_bars_for_indicators {
            return None;
        }
        let snapshot = get_indicators(self.window.as_slice());
        self.indicators = Some(snapshot);
        Some(snapshot)
    }

    /// Debounce + single-flight gate for the signal engine.
    ///
    /// LIVE evaluates once the trailing bar is closed. SIMULATION evaluates when
    /// `draw` succeeds; it is only drawn when nothing else blocks the evaluation.
    pub fn should_evaluate(&self, draw: impl FnOnce() -> bool) -> bool {
        if self.analyzing || self.indicators.is_none() {
            return false;
        }
        let Some(last) = self.window.last() else {
            return false;
        };
        match self.mode {
            Mode::Loading => false,
            Mode::Live => last.is_closed,
            Mode::Simulation => draw(),
        }
    }

    /// Claim the single evaluation slot, returning its inputs.
    pub fn begin_analysis(&mut self) -> Option<(IndicatorSnapshot, Bar)> {
        if self.analyzing {
            return None;
        }
        let inputs = (self.indicators?, *self.window.last()?);
        self.analyzing = true;
        Some(inputs)
    }

    /// Store a finished evaluation and release the slot.
    ///
    /// Strong signals pin a marker to the current trailing bar; returns the marker
    /// when one was added.
    pub fn finish_analysis(&mut self, result: AnalysisResult) -> Option<Marker> {
        self.analyzing = false;
        let signal = result.signal;
        self.analysis = Some(result);

        if !signal.is_strong() {
            return None;
        }
        let time = self.window.last()?.time;
        self.add_marker(time, signal)
    }

    /// Append a marker unless one already exists at `time`.
    pub fn add_marker(&mut self, time: i64, signal: Signal) -> Option<Marker> {
        if self.markers.iter().any(|marker| marker.time == time) {
            return None;
        }
        let marker = Marker { time, signal };
        self.markers.push(marker);
        Some(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(i as i64 * 60_000, close - 0.5, close + 0.1, close - 0.6, close, 0.0, true)
            })
            .collect()
    }

    fn strong_buy() -> AnalysisResult {
        AnalysisResult {
            signal: Signal::StrongBuy,
            confidence: 82,
            reasoning: String::new(),
            stop_loss: 0.0,
            take_profit: 0.0,
            timestamp: 0,
        }
    }

    #[test]
    fn test_indicators_need_more_than_minimum_bars() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(20), Mode::Live);
        assert!(state.recompute().is_none());

        state.apply(Bar::flat(20 * 60_000, 120.0, true));
        assert!(state.recompute().is_some());
    }

    #[test]
    fn test_live_evaluates_only_on_closed_bar() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(30), Mode::Live);
        state.recompute();
        assert!(state.should_evaluate(|| false));

        state.apply(Bar::flat(30 * 60_000, 130.0, false));
        assert!(!state.should_evaluate(|| true));
    }

    #[test]
    fn test_simulation_uses_draw() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(30), Mode::Simulation);
        state.recompute();

        assert!(state.should_evaluate(|| true));
        assert!(!state.should_evaluate(|| false));
    }

    #[test]
    fn test_single_flight() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(30), Mode::Live);
        state.recompute();

        assert!(state.begin_analysis().is_some());
        assert!(state.analyzing);
        assert!(state.begin_analysis().is_none());
        // The draw must not be consumed while an evaluation is pending
        assert!(!state.should_evaluate(|| panic!("drawn while analyzing")));

        state.finish_analysis(strong_buy());
        assert!(!state.analyzing);
        assert!(state.begin_analysis().is_some());
    }

    #[test]
    fn test_marker_idempotent_per_trailing_bar() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(30), Mode::Live);

        assert!(state.finish_analysis(strong_buy()).is_some());
        assert!(state.finish_analysis(strong_buy()).is_none());
        assert_eq!(state.markers.len(), 1);
        assert_eq!(state.markers[0].time, 29 * 60_000);

        let neutral = AnalysisResult {
            signal: Signal::Neutral,
            ..strong_buy()
        };
        state.apply(Bar::flat(30 * 60_000, 130.0, true));
        assert!(state.finish_analysis(neutral).is_none());
        assert_eq!(state.markers.len(), 1);
    }

    #[test]
    fn test_reset_clears_selection_state() {
        let mut state = MarketState::new(1000, 20);
        state.load(rising(30), Mode::Simulation);
        state.recompute();
        state.begin_analysis();
        state.finish_analysis(strong_buy());

        state.reset();

        assert_eq!(state.mode, Mode::Loading);
        assert!(state.window.is_empty());
        assert!(state.indicators.is_none());
        assert!(state.analysis.is_none());
        assert!(state.markers.is_empty());
        assert!(state.last_price.is_none());
        assert!(!state.analyzing);
    }
}
