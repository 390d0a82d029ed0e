//! The background task queue: a bounded multi-producer/multi-consumer ring
//! feeding a fixed pool of worker threads.
//!
//! Producers claim a slot by CAS-incrementing `write_commit` (an
//! ever-increasing counter, reduced mod capacity only when indexing), write
//! the slot, then advance the `write_index` watermark from the value they
//! observed at claim time. Consumers advance `read_index` to claim a slot
//! and sleep on a condvar while the queue is empty. `push` reports a full
//! ring instead of blocking.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use ember_utils::locks::{Condvar, SyncMutex};

/// A queued unit of background work.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Number of slots in the ring. One slot is kept free so the indices can
/// distinguish full from empty.
const QUEUE_CAPACITY: usize = 256;

struct Slot(UnsafeCell<Option<Task>>);

// SAFETY: a slot is only accessed by the producer that claimed its index via
// the write_commit CAS, or by the consumer that claimed it via the read_index
// CAS; the index protocol never hands the same slot to two parties at once.
unsafe impl Sync for Slot {}

/// The shared queue. Workers run until the process exits.
pub struct TaskQueue {
    slots: Vec<Slot>,
    write_commit: AtomicU32,
    write_index: AtomicU32,
    read_index: AtomicU32,
    sleep_lock: SyncMutex<()>,
    sleep_cond: Condvar,
}

impl TaskQueue {
    /// Creates the queue and spawns `worker_count` worker threads.
    #[must_use]
    pub fn start(worker_count: usize) -> Arc<Self> {
        let queue = Arc::new(Self {
            slots: (0..QUEUE_CAPACITY)
                .map(|_| Slot(UnsafeCell::new(None)))
                .collect(),
            write_commit: AtomicU32::new(0),
            write_index: AtomicU32::new(0),
            read_index: AtomicU32::new(0),
            sleep_lock: SyncMutex::new(()),
            sleep_cond: Condvar::new(),
        });
        for index in 0..worker_count {
            let worker = Arc::clone(&queue);
            thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || worker.run_worker())
                .expect("failed to spawn worker thread");
        }
        queue
    }

    /// Enqueues a task. Returns `false` when the ring is full.
    pub fn push(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let size = QUEUE_CAPACITY as u32;
        let mut task = Some(Box::new(task) as Task);

        loop {
            let commit = self.write_commit.load(Ordering::Acquire);
            let read_index = self.read_index.load(Ordering::Acquire);
            let slot_index = commit % size;
            let next_index = (commit + 1) % size;

            if next_index == read_index {
                return false;
            }

            // The commit counter is not reduced mod size so that a full wrap
            // of the ring between our load and the CAS cannot alias our claim.
            if self
                .write_commit
                .compare_exchange(commit, commit + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let slot = &self.slots[slot_index as usize];
            // SAFETY: the successful CAS above makes this producer the sole
            // owner of `slot_index` until write_index passes it.
            unsafe {
                *slot.0.get() = task.take();
            }

            // Publish in claim order: spin until every earlier producer has
            // advanced the watermark to our slot, then advance it past us.
            while self
                .write_index
                .compare_exchange_weak(slot_index, next_index, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                std::hint::spin_loop();
            }

            let _guard = self.sleep_lock.lock();
            self.sleep_cond.notify_one();
            return true;
        }
    }

    fn pop_or_wait(&self) -> Task {
        let size = QUEUE_CAPACITY as u32;
        loop {
            let read_index = self.read_index.load(Ordering::Acquire);
            let write_index = self.write_index.load(Ordering::Acquire);

            if write_index == read_index {
                let mut guard = self.sleep_lock.lock();
                // Re-check under the lock so a concurrent push's notify
                // cannot slip between the check and the wait.
                if self.write_index.load(Ordering::Acquire) == read_index {
                    self.sleep_cond.wait(&mut guard);
                }
                continue;
            }

            let next_index = (read_index + 1) % size;
            if self
                .read_index
                .compare_exchange(read_index, next_index, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let slot = &self.slots[read_index as usize];
            // SAFETY: the successful CAS above makes this consumer the sole
            // owner of `read_index`; the producer finished writing the slot
            // before advancing write_index past it.
            let task = unsafe { (*slot.0.get()).take() };
            if let Some(task) = task {
                return task;
            }
        }
    }

    fn run_worker(&self) {
        loop {
            let task = self.pop_or_wait();
            task();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn tasks_run_on_workers() {
        let queue = TaskQueue::start(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            assert!(queue.push(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 32 {
            assert!(std::time::Instant::now() < deadline, "tasks did not finish");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn push_reports_full() {
        // No workers, so nothing drains the ring.
        let queue = TaskQueue::start(0);
        let mut accepted = 0;
        for _ in 0..QUEUE_CAPACITY + 8 {
            if queue.push(|| {}) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, QUEUE_CAPACITY - 1);
    }

    #[test]
    fn many_producers() {
        let queue = TaskQueue::start(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                let mut pushed = 0usize;
                while pushed < 50 {
                    let counter = Arc::clone(&counter);
                    if queue.push(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }) {
                        pushed += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("producer thread panicked");
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 200 {
            assert!(std::time::Instant::now() < deadline, "tasks did not finish");
            thread::sleep(Duration::from_millis(1));
        }
    }
}
