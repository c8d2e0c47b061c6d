use crate::{
    bar::{Bar, Subscription},
    indicators::IndicatorSnapshot,
    manager::state::{Marker, MarketState, Mode},
    signal::AnalysisResult,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Status of the live stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Typed change notifications published by the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketUpdate {
    /// A new selection started loading history
    Loading { cycle: u64, subscription: Subscription },
    /// The window was replaced wholesale by real or synthetic history
    HistoryLoaded { cycle: u64, mode: Mode, bars: Vec<Bar> },
    /// The trailing bar was replaced in place
    BarUpdated(Bar),
    /// A newer bar was appended, evicting `evicted` of the oldest
    BarAppended { bar: Bar, evicted: usize },
    ModeChanged(Mode),
    IndicatorsUpdated(IndicatorSnapshot),
    AnalysisUpdated(AnalysisResult),
    MarkerAdded(Marker),
    ConnectionChanged(ConnectionStatus),
}

/// Read-only snapshot of everything the manager exposes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketView {
    pub subscription: Option<Subscription>,
    pub mode: Mode,
    pub bars: Vec<Bar>,
    pub indicators: Option<IndicatorSnapshot>,
    pub analysis: Option<AnalysisResult>,
    pub markers: Vec<Marker>,
    pub last_price: Option<f64>,
    pub analyzing: bool,
    pub connection: ConnectionStatus,
}

impl MarketView {
    pub fn new(state: &MarketState, subscription: Option<Subscription>, connection: ConnectionStatus) -> Self {
        Self {
            subscription,
            mode: state.mode,
            bars: state.window.to_vec(),
            indicators: state.indicators,
            analysis: state.analysis.clone(),
            markers: state.markers.clone(),
            last_price: state.last_price,
            analyzing: state.analyzing,
            connection,
        }
    }
}
