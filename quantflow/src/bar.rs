//! Core market data types
//!
//! A [`Bar`] is the unit every other component operates on. [`Instrument`],
//! [`Timeframe`] and [`Subscription`] identify which series the bars belong to.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// One OHLCV interval sample.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Bar {
    /// Open time in milliseconds since the epoch
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// `false` while the bar is still forming
    pub is_closed: bool,
}

impl Bar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64, is_closed: bool) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            is_closed,
        }
    }

    /// A zero-range bar at a single price.
    pub fn flat(time: i64, price: f64, is_closed: bool) -> Self {
        Self::new(time, price, price, price, price, 0.0, is_closed)
    }
}

/// Candle interval of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, Display)]
pub enum Timeframe {
    #[default]
    #[display("1m")]
    #[serde(rename = "1m")]
    M1,
    #[display("5m")]
    #[serde(rename = "5m")]
    M5,
    #[display("15m")]
    #[serde(rename = "15m")]
    M15,
    #[display("30m")]
    #[serde(rename = "30m")]
    M30,
    #[display("1h")]
    #[serde(rename = "1h")]
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
    ];

    /// Exchange interval code, eg/ "15m".
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|timeframe| timeframe.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported timeframe: {s}"))
    }
}

/// A tradable pair, eg/ `btcusdt` displayed as "BTC/USDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[display("{name}")]
pub struct Instrument {
    pub symbol: SmolStr,
    pub name: SmolStr,
}

impl Instrument {
    pub fn new(symbol: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            symbol: SmolStr::new(symbol.as_ref().to_lowercase()),
            name: SmolStr::new(name),
        }
    }

    /// Default instrument catalogue.
    pub fn catalogue() -> Vec<Instrument> {
        vec![
            Instrument::new("btcusdt", "BTC/USDT"),
            Instrument::new("ethusdt", "ETH/USDT"),
            Instrument::new("solusdt", "SOL/USDT"),
            Instrument::new("bnbusdt", "BNB/USDT"),
            Instrument::new("xrbusdt", "XRP/USDT"),
        ]
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument::new("btcusdt", "BTC/USDT")
    }
}

/// The instrument + timeframe pair both external collaborators are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub struct Subscription {
    pub instrument: Instrument,
    pub timeframe: Timeframe,
}

impl Subscription {
    pub fn new(instrument: Instrument, timeframe: Timeframe) -> Self {
        Self {
            instrument,
            timeframe,
        }
    }

    /// Lowercase symbol, eg/ "btcusdt".
    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }

    /// Kline stream name, eg/ "btcusdt@kline_1m".
    pub fn stream_name(&self) -> String {
        format!("{}@kline_{}", self.instrument.symbol, self.timeframe)
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.instrument.symbol, self.timeframe)
    }
}
