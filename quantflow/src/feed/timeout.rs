//! Idle-read guard for live frame streams.
//!
//! A socket can go silent without ever delivering a close frame. Once no item arrives
//! within the idle timeout, [`TimeoutStream`] yields a [`FeedError::Timeout`] and then
//! ends, so a silent connection takes the same disconnect path as a closed one.

use crate::error::FeedError;
use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};
use tracing::warn;

#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    idle_timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, idle_timeout: Duration) -> Self {
        Self {
            inner,
            idle_timeout,
            deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            expired: false,
        }
    }
}

impl<S, T> Stream for TimeoutStream<S>
where
    S: Stream<Item = Result<T, FeedError>> + Unpin,
{
    type Item = Result<T, FeedError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.expired {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                let next_deadline = Instant::now() + self.idle_timeout;
                self.deadline.as_mut().reset(next_deadline);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    let idle_secs = self.idle_timeout.as_secs();
                    warn!(idle_secs, "live stream idle, closing connection");
                    self.expired = true;
                    Poll::Ready(Some(Err(FeedError::Timeout(idle_secs))))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
