use crate::{
    bar::{Bar, Subscription},
    config::EndpointConfig,
    error::FeedError,
    feed::HistorySource,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// One bar of the history wire format; `time` is in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HistoryRow {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl TryFrom<HistoryRow> for Bar {
    type Error = FeedError;

    /// History bars are always closed and carry no volume.
    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let time = row
            .time
            .checked_mul(1000)
            .ok_or_else(|| FeedError::Payload(format!("history time out of range: {}", row.time)))?;
        Ok(Bar::new(time, row.open, row.high, row.low, row.close, 0.0, true))
    }
}

/// Convert history rows into closed bars, rejecting the batch on any bad row.
pub fn bars_from_rows(rows: Vec<HistoryRow>) -> Result<Vec<Bar>, FeedError> {
    rows.into_iter().map(Bar::try_from).collect()
}

/// History from the proxy backend: `GET {base}/api/history?symbol=&interval=`.
#[derive(Debug, Clone)]
pub struct ApiHistory {
    client: reqwest::Client,
    base_url: String,
}

impl ApiHistory {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_client(endpoints)?,
            base_url: endpoints.history_url.clone(),
        })
    }

    pub fn request_url(&self, subscription: &Subscription) -> Result<Url, FeedError> {
        Ok(Url::parse_with_params(
            &format!("{}/api/history", self.base_url.trim_end_matches('/')),
            &[
                ("symbol", subscription.symbol()),
                ("interval", subscription.timeframe.as_str()),
            ],
        )?)
    }
}

#[async_trait]
impl HistorySource for ApiHistory {
    async fn fetch(&self, subscription: &Subscription) -> Result<Vec<Bar>, FeedError> {
        let url = self.request_url(subscription)?;
        debug!(%url, "requesting history");

        let rows: Vec<HistoryRow> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(
            symbol = subscription.symbol(),
            timeframe = %subscription.timeframe,
            bars = rows.len(),
            "history loaded from proxy"
        );
        bars_from_rows(rows)
    }
}

/// Binance REST kline, positional array with numeric-as-text prices.
#[derive(Debug, Deserialize)]
pub struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

impl TryFrom<BinanceKline> for HistoryRow {
    type Error = FeedError;

    fn try_from(kline: BinanceKline) -> Result<Self, Self::Error> {
        let price = |field: &str, name: &str| {
            field
                .parse::<f64>()
                .map_err(|_| FeedError::Payload(format!("kline {name} is not numeric: {field}")))
        };

        Ok(HistoryRow {
            time: kline.0 / 1000,
            open: price(&kline.1, "open")?,
            high: price(&kline.2, "high")?,
            low: price(&kline.3, "low")?,
            close: price(&kline.4, "close")?,
        })
    }
}

/// Convert Binance klines into history rows, oldest first.
pub fn rows_from_klines(klines: Vec<BinanceKline>) -> Result<Vec<HistoryRow>, FeedError> {
    let mut rows = klines
        .into_iter()
        .map(HistoryRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by_key(|row| row.time);
    Ok(rows)
}

/// History straight from `GET {base}/api/v3/klines`, shaped like the proxy output.
#[derive(Debug, Clone)]
pub struct BinanceHistory {
    client: reqwest::Client,
    base_url: String,
    limit: u16,
}

impl BinanceHistory {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_client(endpoints)?,
            base_url: endpoints.binance_rest_url.clone(),
            limit: endpoints.history_limit,
        })
    }

    pub fn request_url(&self, subscription: &Subscription) -> Result<Url, FeedError> {
        let symbol = subscription.symbol().to_uppercase();
        let limit = self.limit.to_string();
        Ok(Url::parse_with_params(
            &format!("{}/api/v3/klines", self.base_url.trim_end_matches('/')),
            &[
                ("symbol", symbol.as_str()),
                ("interval", subscription.timeframe.as_str()),
                ("limit", limit.as_str()),
            ],
        )?)
    }
}

#[async_trait]
impl HistorySource for BinanceHistory {
    async fn fetch(&self, subscription: &Subscription) -> Result<Vec<Bar>, FeedError> {
        let url = self.request_url(subscription)?;
        debug!(%url, "requesting klines");

        let klines: Vec<BinanceKline> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rows = rows_from_klines(klines)?;
        info!(
            symbol = subscription.symbol(),
            timeframe = %subscription.timeframe,
            bars = rows.len(),
            "history loaded from binance"
        );
        bars_from_rows(rows)
    }
}

fn build_client(endpoints: &EndpointConfig) -> Result<reqwest::Client, FeedError> {
    Ok(reqwest::Client::builder()
        .timeout(endpoints.request_timeout)
        .build()?)
}
