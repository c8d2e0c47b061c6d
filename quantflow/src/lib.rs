/// QuantFlow - rolling-window market data engine
///
/// Ingests a price bar series for one instrument at a time and keeps operating when
/// the live source is unavailable:
/// - LOADING: history is requested for the selected instrument and timeframe
/// - LIVE: history loaded, kline stream attached with unconditional reconnect
/// - SIMULATION: history failed, a seeded random walk stands in for the market
///
/// The library includes:
/// - Bounded bar window with forming-bar merge and oldest-first eviction
/// - Indicator library (EMA, RSI, MACD, Aroon, SMI, ATR, swing structure)
/// - Deterministic signal decision engine with ATR risk levels
/// - Confluence report over the classic oscillator definitions
/// - History (REST) and live (WebSocket) adapters for Binance
pub mod bar;
pub mod config;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod manager;
pub mod signal;
pub mod synthetic;
pub mod window;

pub use bar::{Bar, Instrument, Subscription, Timeframe};
pub use config::{EndpointConfig, EngineConfig};
pub use error::{ConfigError, FeedError, ManagerError};
pub use feed::{
    ApiHistory, BinanceHistory, BinanceKlineStream, FrameStream, HistorySource, LiveSource,
};
pub use indicators::{IndicatorSnapshot, Trend, get_indicators};
pub use manager::{
    ConnectionStatus, ManagerHandle, Marker, MarketManager, MarketUpdate, MarketView, Mode,
};
pub use signal::{AnalysisResult, Signal, analyze};
pub use window::{BarWindow, WindowChange};
