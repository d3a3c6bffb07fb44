use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::model::FilterValue;

struct Slot {
    current: FilterValue,
    subscribers: Vec<mpsc::UnboundedSender<FilterValue>>,
}

/// Single-slot holder for the selected filter.
///
/// Every subscriber receives the value current at subscription time and then
/// every later `set`, in call order. Nothing is coalesced here; deciding what
/// to do with a repeated value is up to each observer.
#[derive(Clone)]
pub struct FilterState {
    slot: Arc<Mutex<Slot>>,
}

impl FilterState {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                current: FilterValue::NoFilter,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn set(&self, value: FilterValue) {
        let mut slot = self.slot.lock();
        slot.current = value;
        slot.subscribers.retain(|tx| tx.send(value).is_ok());
        tracing::debug!(filter = %value, subscribers = slot.subscribers.len(), "filter set");
    }

    pub fn current(&self) -> FilterValue {
        self.slot.lock().current
    }

    pub fn subscribe(&self) -> FilterChanges {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.slot.lock();
        // Cannot fail: the receiver is still in hand.
        let _ = tx.send(slot.current);
        slot.subscribers.push(tx);
        FilterChanges { rx }
    }

    /// Disconnects every subscriber; their streams end after draining.
    pub fn close(&self) {
        self.slot.lock().subscribers.clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.slot.lock().subscribers.len()
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("FilterState")
            .field("current", &slot.current)
            .field("subscribers", &slot.subscribers.len())
            .finish()
    }
}

/// Ordered stream of filter values delivered to one subscriber.
#[derive(Debug)]
pub struct FilterChanges {
    rx: mpsc::UnboundedReceiver<FilterValue>,
}

impl Stream for FilterChanges {
    type Item = FilterValue;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
