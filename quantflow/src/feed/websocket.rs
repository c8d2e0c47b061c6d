use crate::{
    bar::Subscription,
    config::{EndpointConfig, EngineConfig},
    error::FeedError,
    feed::{FrameStream, LiveSource, TimeoutStream},
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message,
};
use tracing::{debug, info};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Binance kline stream: one raw connection to `{base}/{symbol}@kline_{tf}` per attach.
#[derive(Debug, Clone)]
pub struct BinanceKlineStream {
    base_url: String,
    idle_timeout: Duration,
}

impl BinanceKlineStream {
    pub fn new(endpoints: &EndpointConfig, config: &EngineConfig) -> Self {
        Self {
            base_url: endpoints.stream_url.clone(),
            idle_timeout: config.stream_idle_timeout,
        }
    }

    pub fn stream_url(&self, subscription: &Subscription) -> Result<Url, FeedError> {
        Ok(Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            subscription.stream_name()
        ))?)
    }
}

#[async_trait]
impl LiveSource for BinanceKlineStream {
    async fn connect(&self, subscription: &Subscription) -> Result<FrameStream, FeedError> {
        let url = self.stream_url(subscription)?;

        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|error| FeedError::Connect {
                url: url.to_string(),
                reason: error.to_string(),
            })?;
        info!(%url, "kline stream connected");

        Ok(TimeoutStream::new(text_frames(socket), self.idle_timeout).boxed())
    }
}

/// Text frames of `socket` until a close frame or a terminal error.
///
/// Control and binary frames are skipped. Errors are yielded; a terminal one ends
/// the stream after it is delivered.
fn text_frames(socket: Socket) -> FrameStream {
    futures::stream::unfold(Some(socket), |socket| async move {
        let mut socket = socket?;
        loop {
            match socket.next().await? {
                Ok(Message::Text(text)) => return Some((Ok(text.as_str().to_owned()), Some(socket))),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "kline stream received close frame");
                    return None;
                }
                Ok(_) => continue,
                Err(error) => {
                    let error = FeedError::from(error);
                    let next = (!error.is_terminal()).then_some(socket);
                    return Some((Err(error), next));
                }
            }
        }
    })
    .boxed()
}
