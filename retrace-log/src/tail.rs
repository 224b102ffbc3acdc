//! Live subscription to events pushed into an [`EventBuffer`](crate::EventBuffer).
//!
//! A tail only ever holds its own broadcast receiver: dropping or
//! cancelling it releases the receiver and never touches buffered events.

use std::sync::Arc;

use futures_util::stream::{self, Stream};
use log::warn;
use retrace_core::SourceEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

pub struct Tail {
    receiver: broadcast::Receiver<Arc<SourceEvent>>,
    cancel: watch::Receiver<bool>,
    skipped: u64,
}

impl Tail {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<SourceEvent>>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            receiver,
            cancel,
            skipped: 0,
        }
    }

    /// Next pushed event, or `None` once cancelled or the buffer is gone.
    ///
    /// A subscriber that falls more than the channel capacity behind skips
    /// the oldest events it missed; the count is in [`Tail::skipped`].
    pub async fn next(&mut self) -> Option<Arc<SourceEvent>> {
        loop {
            if self.is_cancelled() {
                return None;
            }
            tokio::select! {
                biased;
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        // Signal sender dropped: nobody can resume us.
                        return None;
                    }
                }
                received = self.receiver.recv() => match received {
                    Ok(event) => return Some(event),
                    Err(RecvError::Lagged(n)) => {
                        warn!("tail subscriber lagged, skipped {n} events");
                        self.skipped += n;
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Events dropped because this subscriber lagged.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_stream(self) -> impl Stream<Item = Arc<SourceEvent>> {
        stream::unfold(self, |mut tail| async move {
            let event = tail.next().await?;
            Some((event, tail))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BufferConfig;
    use crate::EventBuffer;
    use futures_util::StreamExt;
    use retrace_core::{Interaction, Point, SourceEvent};
    use tokio::sync::watch;

    fn click(time: u32) -> SourceEvent {
        SourceEvent::interaction(
            time,
            Interaction::Click {
                target: None,
                position: Point::new(time as i32, 0),
            },
        )
    }

    #[tokio::test]
    async fn test_tail_receives_only_later_events() {
        let mut buf = EventBuffer::new(BufferConfig::for_testing());
        buf.push(click(1)).unwrap();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut tail = buf.tail(cancel_rx);
        buf.push(click(2)).unwrap();
        buf.push(click(3)).unwrap();
        assert_eq!(tail.next().await.unwrap().time, 2);
        assert_eq!(tail.next().await.unwrap().time, 3);
    }

    #[tokio::test]
    async fn test_cancel_ends_tail_and_keeps_buffer() {
        let mut buf = EventBuffer::new(BufferConfig::for_testing());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut tail = buf.tail(cancel_rx);
        buf.push(click(1)).unwrap();
        cancel_tx.send(true).unwrap();
        assert!(tail.next().await.is_none());
        assert!(tail.is_cancelled());
        assert_eq!(buf.len(), 1);
    }

    #[tokio::test]
    async fn test_lagging_tail_skips() {
        let config = BufferConfig {
            max_bytes: 1 << 20,
            tail_capacity: 2,
        };
        let mut buf = EventBuffer::new(config);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut tail = buf.tail(cancel_rx);
        for t in 0..5 {
            buf.push(click(t)).unwrap();
        }
        assert_eq!(tail.next().await.unwrap().time, 3);
        assert_eq!(tail.skipped(), 3);
    }

    #[tokio::test]
    async fn test_stream_ends_when_buffer_dropped() {
        let mut buf = EventBuffer::new(BufferConfig::for_testing());
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let stream = buf.tail(cancel_rx).into_stream();
        buf.push(click(7)).unwrap();
        drop(buf);
        let times: Vec<u32> = stream.map(|e| e.time).collect().await;
        assert_eq!(times, vec![7]);
    }
}
