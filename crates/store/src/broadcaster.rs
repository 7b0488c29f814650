//! Per-claim log fan-out.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a
//! subscriber whose queue is full is sent [`EndReason::Lagged`] and dropped.
//! One slot of every queue is held back so the terminal marker always fits.
//!
//! Terminal markers are kept for the most recent finished claims only; for
//! older claims callers fall back to [`LogBroadcaster::settle`] with the
//! stored status.

use futures::Stream;
use roadclaim_core::{ClaimStatus, LogEvent};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Why a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    Failed,
    /// This subscriber fell behind and was dropped. The run continues.
    Lagged,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Lagged => "lagged",
        }
    }

    /// Terminal marker matching a stored claim status, if it is terminal.
    pub fn for_status(status: ClaimStatus) -> Option<Self> {
        match status {
            ClaimStatus::Completed => Some(Self::Completed),
            ClaimStatus::Failed => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One item on a subscription. `End` is always the last.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Event(LogEvent),
    End(EndReason),
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<StreamItem>,
}

#[derive(Default)]
struct Channels {
    live: HashMap<String, Vec<Subscriber>>,
    finished: HashMap<String, EndReason>,
    /// Finish order, oldest first, for evicting markers.
    finished_order: VecDeque<String>,
    next_id: u64,
}

impl Channels {
    fn mark_finished(&mut self, claim_id: &str, reason: EndReason, retained: usize) {
        if self.finished.insert(claim_id.to_string(), reason).is_none() {
            self.finished_order.push_back(claim_id.to_string());
        }
        while self.finished_order.len() > retained {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }
}

/// Number of terminal markers kept by [`LogBroadcaster::new`].
pub const DEFAULT_RETAINED_MARKERS: usize = 1024;

#[derive(Clone)]
pub struct LogBroadcaster {
    channels: Arc<Mutex<Channels>>,
    buffer: usize,
    retained: usize,
}

impl LogBroadcaster {
    /// `buffer` is the number of events a subscriber may fall behind by.
    pub fn new(buffer: usize) -> Self {
        Self::with_retention(buffer, DEFAULT_RETAINED_MARKERS)
    }

    /// Like [`new`](Self::new), keeping terminal markers for the `retained`
    /// most recently finished claims.
    pub fn with_retention(buffer: usize, retained: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(Channels::default())),
            buffer: buffer.max(1),
            retained: retained.max(1),
        }
    }

    /// Deliver `event` to every current subscriber of its claim.
    pub fn publish(&self, event: LogEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if channels.finished.contains_key(&event.claim_id) {
            tracing::debug!(claim_id = %event.claim_id, "Dropping event published after finish");
            return;
        }
        let Some(subscribers) = channels.live.get_mut(&event.claim_id) else {
            return;
        };

        subscribers.retain(|sub| {
            if sub.tx.is_closed() {
                return false;
            }
            if sub.tx.capacity() <= 1 {
                tracing::warn!(
                    claim_id = %event.claim_id,
                    subscriber = sub.id,
                    "Dropping lagging log subscriber"
                );
                let _ = sub.tx.try_send(StreamItem::End(EndReason::Lagged));
                return false;
            }
            sub.tx.try_send(StreamItem::Event(event.clone())).is_ok()
        });

        if subscribers.is_empty() {
            channels.live.remove(&event.claim_id);
        }
    }

    /// Send the terminal marker to all current subscribers and tear the
    /// channel down. Later subscribers receive the marker immediately.
    pub fn finish(&self, claim_id: &str, reason: EndReason) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        Self::end_live(&mut channels, claim_id, reason);
        channels.mark_finished(claim_id, reason, self.retained);
    }

    /// [`finish`](Self::finish) for a claim already known to be terminal,
    /// unless its marker is still held. Returns whether anything changed.
    pub fn settle(&self, claim_id: &str, reason: EndReason) -> bool {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if channels.finished.contains_key(claim_id) {
            return false;
        }
        tracing::debug!(
            claim_id,
            reason = reason.as_str(),
            "Settling claim stream from stored status"
        );
        Self::end_live(&mut channels, claim_id, reason);
        channels.mark_finished(claim_id, reason, self.retained);
        true
    }

    fn end_live(channels: &mut Channels, claim_id: &str, reason: EndReason) {
        if let Some(subscribers) = channels.live.remove(claim_id) {
            for sub in subscribers {
                let _ = sub.tx.try_send(StreamItem::End(reason));
            }
        }
    }

    pub fn subscribe(&self, claim_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer + 1);
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let id = channels.next_id;
        channels.next_id += 1;

        if let Some(reason) = channels.finished.get(claim_id).copied() {
            let _ = tx.try_send(StreamItem::End(reason));
        } else {
            channels
                .live
                .entry(claim_id.to_string())
                .or_default()
                .push(Subscriber { id, tx });
        }

        Subscription {
            claim_id: claim_id.to_string(),
            id,
            rx,
            ended: false,
            channels: Arc::clone(&self.channels),
        }
    }

    pub fn subscriber_count(&self, claim_id: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.live.get(claim_id).map_or(0, Vec::len)
    }

    pub fn is_finished(&self, claim_id: &str) -> bool {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.finished.contains_key(claim_id)
    }
}

/// A live view of one claim's log. Yields events, then exactly one `End`.
///
/// Dropping it unsubscribes; the run is unaffected.
pub struct Subscription {
    claim_id: String,
    id: u64,
    rx: mpsc::Receiver<StreamItem>,
    ended: bool,
    channels: Arc<Mutex<Channels>>,
}

impl Subscription {
    pub fn claim_id(&self) -> &str {
        &self.claim_id
    }

    /// Next item, or `None` once `End` has been yielded.
    pub async fn recv(&mut self) -> Option<StreamItem> {
        if self.ended {
            return None;
        }
        let item = self.rx.recv().await?;
        if matches!(item, StreamItem::End(_)) {
            self.ended = true;
        }
        Some(item)
    }
}

impl Stream for Subscription {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => {
                if matches!(item, StreamItem::End(_)) {
                    self.ended = true;
                }
                Poll::Ready(Some(item))
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subscribers) = channels.live.get_mut(&self.claim_id) {
            subscribers.retain(|s| s.id != self.id);
            if subscribers.is_empty() {
                channels.live.remove(&self.claim_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn event(claim: &str, n: usize) -> LogEvent {
        LogEvent::info(claim, format!("step {n}"))
    }

    #[tokio::test]
    async fn fan_out_to_every_subscriber_in_order() {
        let broadcaster = LogBroadcaster::new(16);
        let mut a = broadcaster.subscribe("c1");
        let mut b = broadcaster.subscribe("c1");

        for n in 0..3 {
            broadcaster.publish(event("c1", n));
        }
        broadcaster.finish("c1", EndReason::Completed);

        for sub in [&mut a, &mut b] {
            for n in 0..3 {
                match sub.recv().await {
                    Some(StreamItem::Event(e)) => assert_eq!(e.message, format!("step {n}")),
                    other => panic!("unexpected {other:?}"),
                }
            }
            assert!(matches!(sub.recv().await, Some(StreamItem::End(EndReason::Completed))));
            assert!(sub.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let broadcaster = LogBroadcaster::new(16);
        broadcaster.publish(event("c1", 0));
        let mut late = broadcaster.subscribe("c1");
        broadcaster.publish(event("c1", 1));
        broadcaster.finish("c1", EndReason::Failed);

        let items: Vec<StreamItem> = (&mut late).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], StreamItem::Event(e) if e.message == "step 1"));
        assert!(matches!(items[1], StreamItem::End(EndReason::Failed)));
    }

    #[tokio::test]
    async fn subscribe_after_finish_ends_immediately() {
        let broadcaster = LogBroadcaster::new(4);
        broadcaster.finish("c1", EndReason::Completed);
        let items: Vec<StreamItem> = broadcaster.subscribe("c1").collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], StreamItem::End(EndReason::Completed)));
        assert_eq!(broadcaster.subscriber_count("c1"), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_without_blocking() {
        let broadcaster = LogBroadcaster::new(2);
        let mut slow = broadcaster.subscribe("c1");
        let mut fast = broadcaster.subscribe("c1");

        broadcaster.publish(event("c1", 0));
        // Keep `fast` drained; `slow` never reads.
        assert!(matches!(fast.recv().await, Some(StreamItem::Event(_))));
        broadcaster.publish(event("c1", 1));
        assert!(matches!(fast.recv().await, Some(StreamItem::Event(_))));
        broadcaster.publish(event("c1", 2));
        assert!(matches!(fast.recv().await, Some(StreamItem::Event(_))));

        assert_eq!(broadcaster.subscriber_count("c1"), 1);
        let items: Vec<StreamItem> = (&mut slow).collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], StreamItem::End(EndReason::Lagged)));

        broadcaster.finish("c1", EndReason::Completed);
        assert!(matches!(fast.recv().await, Some(StreamItem::End(EndReason::Completed))));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let broadcaster = LogBroadcaster::new(4);
        let sub = broadcaster.subscribe("c1");
        assert_eq!(broadcaster.subscriber_count("c1"), 1);
        drop(sub);
        assert_eq!(broadcaster.subscriber_count("c1"), 0);
        broadcaster.publish(event("c1", 0));
    }

    #[tokio::test]
    async fn claims_are_isolated() {
        let broadcaster = LogBroadcaster::new(4);
        let mut one = broadcaster.subscribe("c1");
        broadcaster.publish(event("c2", 0));
        broadcaster.finish("c1", EndReason::Completed);
        assert!(matches!(one.recv().await, Some(StreamItem::End(_))));
        assert!(!broadcaster.is_finished("c2"));
    }

    #[test]
    fn only_recent_markers_are_retained() {
        let broadcaster = LogBroadcaster::with_retention(4, 2);
        broadcaster.finish("c1", EndReason::Completed);
        broadcaster.finish("c2", EndReason::Failed);
        broadcaster.finish("c3", EndReason::Completed);

        assert!(!broadcaster.is_finished("c1"));
        assert!(broadcaster.is_finished("c2"));
        assert!(broadcaster.is_finished("c3"));
    }

    #[tokio::test]
    async fn settle_ends_stream_of_evicted_claim() {
        let broadcaster = LogBroadcaster::with_retention(4, 1);
        broadcaster.finish("c1", EndReason::Failed);
        broadcaster.finish("c2", EndReason::Completed);

        // Marker for c1 is gone, so a new subscriber waits until settled.
        let mut sub = broadcaster.subscribe("c1");
        assert_eq!(broadcaster.subscriber_count("c1"), 1);
        assert!(broadcaster.settle("c1", EndReason::Failed));

        assert!(matches!(sub.recv().await, Some(StreamItem::End(EndReason::Failed))));
        assert!(sub.recv().await.is_none());
        // Already held: no-op.
        assert!(!broadcaster.settle("c1", EndReason::Failed));
    }

    #[test]
    fn end_reason_follows_terminal_status() {
        assert_eq!(EndReason::for_status(ClaimStatus::Completed), Some(EndReason::Completed));
        assert_eq!(EndReason::for_status(ClaimStatus::Failed), Some(EndReason::Failed));
        assert_eq!(EndReason::for_status(ClaimStatus::CoverageCheck), None);
    }
}
