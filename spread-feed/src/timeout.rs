//! Idle timeout wrapper for the push subscription stream.
//!
//! A GraphQL WebSocket server sends `ka` keep-alive frames, so a stream that stays silent
//! longer than the configured period is treated as dead and terminated, handing control back
//! to the reconnect loop.

use futures::{Stream, StreamExt, ready};
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;
use tracing::warn;

/// Default idle timeout for the push stream (2 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Stream wrapper that ends the inner stream once no item arrived for `timeout_duration`.
#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout_duration: Duration,
    deadline: Pin<Box<tokio::time::Sleep>>,
    timed_out: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout_duration: Duration) -> Self {
        Self {
            inner,
            timeout_duration,
            deadline: Box::pin(tokio::time::sleep(timeout_duration)),
            timed_out: false,
        }
    }

    pub fn with_default_timeout(inner: S) -> Self {
        Self::new(inner, DEFAULT_IDLE_TIMEOUT)
    }

    /// Whether the stream was terminated by the idle timeout rather than by the inner stream.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Poll::Ready(item) = this.inner.poll_next_unpin(cx) {
            if item.is_some() {
                this.deadline.as_mut().reset(Instant::now() + this.timeout_duration);
            }
            return Poll::Ready(item);
        }

        ready!(this.deadline.as_mut().poll(cx));
        warn!(
            timeout_secs = this.timeout_duration.as_secs(),
            "push stream idle, ending it for reconnection"
        );

        // A caller polling again must wait a full period before timing out again
        this.deadline.as_mut().reset(Instant::now() + this.timeout_duration);
        this.timed_out = true;
        Poll::Ready(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out() {
        let mut stream = TimeoutStream::new(futures::stream::pending::<u8>(), Duration::from_secs(5));

        assert_eq!(stream.next().await, None);
        assert!(stream.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_pass_through_until_inner_ends() {
        let mut stream = TimeoutStream::with_default_timeout(futures::stream::iter(vec![1, 2, 3]));

        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }

        assert_eq!(items, vec![1, 2, 3]);
        assert!(!stream.timed_out());
    }
}
