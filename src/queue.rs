//! The event queue and the counting semaphore that wakes the worker.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::event::Event;

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counting semaphore.
#[derive(Debug, Default)]
pub(crate) struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `n` permits.
    pub(crate) fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        *lock(&self.count) += n;
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    /// Block until a permit is available and take it.
    pub(crate) fn acquire(&self) {
        let mut count = lock(&self.count);
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Take a permit if one is available.
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> bool {
        let mut count = lock(&self.count);
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Permits currently available.
    #[cfg(test)]
    pub(crate) fn permits(&self) -> usize {
        *lock(&self.count)
    }
}

/// One queue slot.
#[derive(Debug)]
pub(crate) enum QueueItem {
    /// An event to run through the chain.
    Event(Event),
    /// The worker exits when it reaches this item.
    Shutdown,
}

/// FIFO of pending items.
#[derive(Debug, Default)]
pub(crate) struct Queue {
    items: VecDeque<QueueItem>,
}

impl Queue {
    pub(crate) fn push(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    /// Take everything queued, oldest first.
    pub(crate) fn drain_all(&mut self) -> VecDeque<QueueItem> {
        std::mem::take(&mut self.items)
    }

    /// Drop every queued event, keeping a pending shutdown marker. Returns
    /// how many events were dropped.
    pub(crate) fn discard_events(&mut self) -> usize {
        let before = self.items.len();
        self.items
            .retain(|item| matches!(item, QueueItem::Shutdown));
        before - self.items.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_semaphore_counts_permits() {
        let sem = Semaphore::new();
        sem.release(3);
        assert_eq!(sem.permits(), 3);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_semaphore_wakes_waiter() {
        let sem = Arc::new(Semaphore::new());
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };
        sem.release(1);
        waiter.join().unwrap();
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn test_queue_is_fifo_and_discard_keeps_shutdown() {
        let mut q = Queue::default();
        for i in 0..3 {
            q.push(QueueItem::Event(Event::text(Severity::Info, i.to_string())));
        }
        q.push(QueueItem::Shutdown);
        q.push(QueueItem::Event(Event::text(Severity::Info, "late")));

        assert_eq!(q.discard_events(), 4);
        assert_eq!(q.len(), 1);
        assert!(matches!(q.drain_all().pop_front(), Some(QueueItem::Shutdown)));

        q.push(QueueItem::Event(Event::text(Severity::Info, "a")));
        q.push(QueueItem::Event(Event::text(Severity::Info, "b")));
        let order: Vec<String> = q
            .drain_all()
            .into_iter()
            .filter_map(|item| match item {
                QueueItem::Event(e) => match e.kind() {
                    crate::event::EventKind::Text(t) => Some(t.clone()),
                    _ => None,
                },
                QueueItem::Shutdown => None,
            })
            .collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(q.len(), 0);
    }
}
