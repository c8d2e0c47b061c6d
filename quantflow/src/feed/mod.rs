//! External collaborators of the manager: one-shot history retrieval and the live
//! kline stream. Both are trait seams so the manager can be driven by in-memory fakes.

use crate::{bar::Bar, bar::Subscription, error::FeedError};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod history;
pub mod kline;
pub mod timeout;
pub mod websocket;

pub use history::{ApiHistory, BinanceHistory, HistoryRow, bars_from_rows};
pub use kline::parse_kline_message;
pub use timeout::TimeoutStream;
pub use websocket::BinanceKlineStream;

/// Raw text frames of one live connection. The stream ending means the connection closed.
pub type FrameStream = BoxStream<'static, Result<String, FeedError>>;

/// Source of the initial bar batch for a [`Subscription`].
#[async_trait]
pub trait HistorySource: Send + Sync + 'static {
    async fn fetch(&self, subscription: &Subscription) -> Result<Vec<Bar>, FeedError>;
}

/// Source of live kline frames for a [`Subscription`].
#[async_trait]
pub trait LiveSource: Send + Sync + 'static {
    async fn connect(&self, subscription: &Subscription) -> Result<FrameStream, FeedError>;
}
