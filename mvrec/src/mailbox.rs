//! # Single slot, coalescing hand-off

use log::*;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct Slot<T> {
    item: Option<T>,
    closed: bool,
    coalesced: u64,
}

/// Outcome of [`Mailbox::post`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posted {
    /// The slot was empty.
    Stored,
    /// An unconsumed item was discarded in favour of the new one.
    Replaced,
    /// The mailbox is closed, the new item was dropped.
    Closed,
}

/// Lossy single slot channel.
///
/// The producer never blocks: posting while a previous item is still unconsumed drops the
/// previous item. The consumer always receives the freshest item, never a backlog.
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot {
                item: None,
                closed: false,
                coalesced: 0,
            }),
            ready: Condvar::new(),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an item, replacing any unconsumed one, and wake the consumer.
    ///
    /// Items posted after [`close`](Self::close) are dropped and [`Posted::Closed`] is returned.
    pub fn post(&self, item: T) -> Posted {
        let posted = {
            let mut slot = self.lock();

            if slot.closed {
                debug!("Mailbox closed, dropping item");
                return Posted::Closed;
            }

            if slot.item.replace(item).is_some() {
                slot.coalesced += 1;
                debug!("Coalesced unconsumed item ({} total)", slot.coalesced);
                Posted::Replaced
            } else {
                Posted::Stored
            }
        };

        self.ready.notify_one();

        posted
    }

    /// Block until an item is available and take it.
    ///
    /// Returns `None` once the mailbox has been closed and the last item has been drained.
    pub fn take_blocking(&self) -> Option<T> {
        let mut slot = self
            .ready
            .wait_while(self.lock(), |slot| slot.item.is_none() && !slot.closed)
            .unwrap_or_else(PoisonError::into_inner);

        slot.item.take()
    }

    /// Take an item if one is available, without blocking.
    pub fn try_take(&self) -> Option<T> {
        self.lock().item.take()
    }

    /// Close the mailbox, waking up the consumer.
    ///
    /// An item already in the slot can still be taken.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of items dropped because they were overwritten before being taken.
    pub fn coalesced(&self) -> u64 {
        self.lock().coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Tracked(&'static str, Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn latest_wins() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mailbox = Mailbox::new();

        assert_eq!(mailbox.post(Tracked("a", drops.clone())), Posted::Stored);
        assert_eq!(mailbox.post(Tracked("b", drops.clone())), Posted::Replaced);

        // A is released on overwrite.
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let item = mailbox.take_blocking().unwrap();
        assert_eq!(item.0, "b");
        assert!(mailbox.try_take().is_none());
        assert_eq!(mailbox.coalesced(), 1);
    }

    #[test]
    fn wakes_blocked_consumer() {
        let mailbox = Arc::new(Mailbox::new());

        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.take_blocking())
        };

        thread::sleep(Duration::from_millis(50));
        mailbox.post(42);

        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn close_drains_then_ends() {
        let mailbox = Mailbox::new();
        mailbox.post(1);
        mailbox.close();

        assert_eq!(mailbox.post(2), Posted::Closed);
        assert!(mailbox.is_closed());
        assert_eq!(mailbox.take_blocking(), Some(1));
        assert_eq!(mailbox.take_blocking(), None);
    }

    #[test]
    fn closed_post_releases_item() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mailbox = Mailbox::new();
        mailbox.close();

        assert_eq!(mailbox.post(Tracked("late", drops.clone())), Posted::Closed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(mailbox.coalesced(), 0);
        assert!(mailbox.try_take().is_none());
    }

    #[test]
    fn close_wakes_idle_consumer() {
        let mailbox = Arc::new(Mailbox::<u32>::new());

        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.take_blocking())
        };

        thread::sleep(Duration::from_millis(50));
        mailbox.close();

        assert_eq!(consumer.join().unwrap(), None);
    }
}
