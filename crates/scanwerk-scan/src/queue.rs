// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded page queue between the acquisition thread and the consumer.
//
// The producer blocks in `push` while the queue is full. The consumer blocks
// in `pop_wait` while the queue is empty and acquisition has not completed.
// Both sides are woken through condition variables, never by polling.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use scanwerk_core::error::{Result, ScanwerkError};
use tracing::debug;

struct QueueState<T> {
    items: VecDeque<T>,
    /// Set once by the producer: no more pushes will happen.
    complete: bool,
    /// Set by either side to stop the run early.
    aborted: bool,
}

/// Bounded, thread-safe FIFO with a set-once completion signal.
pub struct PageQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> PageQueue<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.max(1)),
                complete: false,
                aborted: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item`, blocking while the queue is full.
    ///
    /// Fails with [`ScanwerkError::QueueClosed`] once the queue was aborted or
    /// completion was signalled.
    pub fn push(&self, item: T) -> Result<()> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !state.aborted {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.aborted || state.complete {
            return Err(ScanwerkError::QueueClosed);
        }
        state.items.push_back(item);
        debug!(queued = state.items.len(), "Page queued");
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Mark that no more items will be pushed. Returns `false` if it was
    /// already signalled.
    pub fn signal_complete(&self) -> bool {
        let mut state = self.lock();
        if state.complete {
            return false;
        }
        state.complete = true;
        drop(state);
        self.not_empty.notify_all();
        true
    }

    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    /// Stop the run: wake every waiter and refuse further pushes.
    pub fn abort(&self) {
        self.lock().aborted = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Next item in FIFO order, waiting while the queue is empty and not yet
    /// complete. `None` means the stream is finished (or aborted).
    pub fn pop_wait(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if state.aborted {
                return None;
            }
            // Read completion before emptiness: a push racing with the
            // completion signal has already landed by the time `complete`
            // is observed under this lock.
            let complete = state.complete;
            match state.items.pop_front() {
                Some(item) => {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(item);
                }
                None if complete => return None,
                None => {
                    state = self
                        .not_empty
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let queue = PageQueue::new(4);
        for i in 0..3 {
            queue.push(i).expect("push");
        }
        assert_eq!(queue.len(), 3);
        queue.signal_complete();
        assert_eq!(queue.pop_wait(), Some(0));
        assert_eq!(queue.pop_wait(), Some(1));
        assert_eq!(queue.pop_wait(), Some(2));
        assert_eq!(queue.pop_wait(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn completion_is_set_once() {
        let queue: PageQueue<u8> = PageQueue::new(1);
        assert!(queue.signal_complete());
        assert!(!queue.signal_complete());
        assert!(queue.is_complete());
        assert!(matches!(queue.push(1), Err(ScanwerkError::QueueClosed)));
    }

    #[test]
    fn drains_before_reporting_end() {
        let queue = PageQueue::new(4);
        queue.push("a").expect("push");
        queue.push("b").expect("push");
        queue.signal_complete();
        assert_eq!(queue.pop_wait(), Some("a"));
        assert_eq!(queue.pop_wait(), Some("b"));
        assert_eq!(queue.pop_wait(), None);
    }

    #[test]
    fn producer_blocks_when_full() {
        let queue = Arc::new(PageQueue::new(2));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..10 {
                    queue.push(i).expect("push");
                }
                queue.signal_complete();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(queue.len() <= 2);

        let mut seen = Vec::new();
        while let Some(item) = queue.pop_wait() {
            seen.push(item);
        }
        producer.join().expect("producer");
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn consumer_waits_for_late_pages() {
        let queue = Arc::new(PageQueue::new(1));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                queue.push(7).expect("push");
                queue.signal_complete();
            })
        };
        assert_eq!(queue.pop_wait(), Some(7));
        assert_eq!(queue.pop_wait(), None);
        producer.join().expect("producer");
    }

    #[test]
    fn abort_releases_blocked_producer() {
        let queue = Arc::new(PageQueue::new(1));
        queue.push(0).expect("first push fits");
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1))
        };
        thread::sleep(Duration::from_millis(30));
        queue.abort();
        let result = producer.join().expect("producer");
        assert!(matches!(result, Err(ScanwerkError::QueueClosed)));
        assert_eq!(queue.pop_wait(), None);
    }
}
