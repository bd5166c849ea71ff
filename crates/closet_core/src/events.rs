//! Change notification bus and live query subscriptions.
//!
//! # Responsibility
//! - Carry "these tables changed" notifications from write paths to listeners.
//! - Fan snapshots out to every live subscriber of a query.
//!
//! # Invariants
//! - Publishing never blocks on a subscriber.
//! - Each subscriber keeps only its latest unread value; live queries carry
//!   full snapshots, so intermediate ones are safe to drop.
//! - Dropping a `Subscription` unsubscribes; its slot is pruned on the next
//!   publish.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Catalog tables a write can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogTable {
    Images,
    Tags,
    ImageTags,
}

/// One committed write, described by the tables it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogChange {
    pub tables: Vec<CatalogTable>,
}

impl CatalogChange {
    pub fn new(tables: &[CatalogTable]) -> Self {
        Self {
            tables: tables.to_vec(),
        }
    }

    pub fn touches(&self, table: CatalogTable) -> bool {
        self.tables.contains(&table)
    }
}

/// Latest undelivered value of one subscriber.
#[derive(Debug)]
struct Slot<T> {
    state: Mutex<SlotState<T>>,
    changed: Condvar,
}

#[derive(Debug)]
struct SlotState<T> {
    pending: Option<T>,
    closed: bool,
}

impl<T> Slot<T> {
    fn new(initial: Option<T>) -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: initial,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put(&self, value: T) {
        self.lock().pending = Some(value);
        self.changed.notify_all();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }
}

/// Receiving end of a live stream.
///
/// Holds at most one undelivered value: a newer publish replaces an unread
/// older one, so a subscriber that never reads retains a single snapshot.
#[derive(Debug)]
pub struct Subscription<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Subscription<T> {
    /// Blocks until a value is pending. Returns `None` once the publisher is
    /// gone and nothing is left to read.
    pub fn recv(&self) -> Option<T> {
        let mut state = self.slot.lock();
        loop {
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self
                .slot
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Returns the pending value, if any, without blocking.
    pub fn try_recv(&self) -> Option<T> {
        self.slot.lock().pending.take()
    }

    /// Waits up to `timeout` for a pending value.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.lock();
        loop {
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            let now = Instant::now();
            if state.closed || now >= deadline {
                return None;
            }
            state = self
                .slot
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Alias of `try_recv`; older values are already superseded.
    pub fn latest(&self) -> Option<T> {
        self.try_recv()
    }
}

/// Sending side shared by all subscribers of one stream.
#[derive(Debug)]
pub struct Publisher<T> {
    slots: Vec<Arc<Slot<T>>>,
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.close();
        }
    }
}

impl<T: Clone> Publisher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. `initial` is pending right away.
    pub fn subscribe(&mut self, initial: Option<T>) -> Subscription<T> {
        let slot = Arc::new(Slot::new(initial));
        self.slots.push(Arc::clone(&slot));
        Subscription { slot }
    }

    /// Hands `value` to every live subscriber. Returns how many received it.
    pub fn publish(&mut self, value: &T) -> usize {
        self.prune();
        for slot in &self.slots {
            slot.put(value.clone());
        }
        self.slots.len()
    }

    /// Returns whether anyone may still be listening.
    pub fn has_subscribers(&self) -> bool {
        self.slots.iter().any(|slot| Arc::strong_count(slot) > 1)
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }

    fn prune(&mut self) {
        self.slots.retain(|slot| Arc::strong_count(slot) > 1);
    }
}

/// Bus for raw table-change notifications.
pub type ChangeBus = Publisher<CatalogChange>;

#[cfg(test)]
mod tests {
    use super::{CatalogChange, CatalogTable, ChangeBus, Publisher};
    use std::time::Duration;

    #[test]
    fn subscribe_makes_initial_value_pending() {
        let mut publisher = Publisher::new();
        let subscription = publisher.subscribe(Some(1));
        assert_eq!(subscription.try_recv(), Some(1));
        assert_eq!(subscription.try_recv(), None);

        publisher.publish(&2);
        assert_eq!(subscription.try_recv(), Some(2));
    }

    #[test]
    fn unread_subscriber_retains_only_newest_value() {
        let mut publisher = Publisher::new();
        let idle = publisher.subscribe(Some(vec![0_u8; 4]));
        for size in 1..=100 {
            publisher.publish(&vec![0_u8; size]);
        }

        assert_eq!(idle.try_recv().map(|snapshot| snapshot.len()), Some(100));
        assert_eq!(idle.try_recv(), None);
    }

    #[test]
    fn recv_wakes_on_publish_from_another_thread() {
        let mut publisher = Publisher::new();
        let subscription = publisher.subscribe(None);
        let sender = std::thread::spawn(move || {
            publisher.publish(&7_u32);
            publisher
        });

        assert_eq!(subscription.recv_timeout(Duration::from_secs(5)), Some(7));
        drop(sender.join().unwrap());
        assert_eq!(subscription.recv(), None);
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let mut publisher = Publisher::new();
        let kept = publisher.subscribe(None);
        let dropped = publisher.subscribe(None);
        assert_eq!(publisher.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(publisher.publish(&"snapshot".to_string()), 1);
        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(kept.recv_timeout(Duration::from_millis(10)).as_deref(), Some("snapshot"));
    }

    #[test]
    fn latest_skips_stale_snapshots() {
        let mut publisher = Publisher::new();
        let subscription = publisher.subscribe(Some(0));
        for value in 1..=3 {
            publisher.publish(&value);
        }
        assert_eq!(subscription.latest(), Some(3));
        assert_eq!(subscription.latest(), None);
    }

    #[test]
    fn change_bus_reports_touched_tables() {
        let mut bus = ChangeBus::new();
        let listener = bus.subscribe(None);
        bus.publish(&CatalogChange::new(&[CatalogTable::ImageTags]));

        let change = listener.try_recv().unwrap();
        assert!(change.touches(CatalogTable::ImageTags));
        assert!(!change.touches(CatalogTable::Images));
    }

    #[test]
    fn recv_returns_none_after_publisher_drop() {
        let mut publisher: Publisher<u8> = Publisher::new();
        let subscription = publisher.subscribe(None);
        drop(publisher);
        assert_eq!(subscription.recv(), None);
    }
}
