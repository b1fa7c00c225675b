use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::trace;
use node_util::sync::{Condvar, Mutex};

use crate::check::Check;

/// Hard-coded slot count for the `done` array. The master always occupies
/// slot 0; a queue built with fewer workers pre-marks the unused slots as
/// done so the master's termination check (which always reads all
/// `MAX_SLOTS` entries) doesn't wait on threads that don't exist.
pub const MAX_SLOTS: usize = 16;

/// Predicates are popped off the shared buffer in small runs so that no
/// single worker can monopolize the lock while it evaluates a long batch.
const CHUNK_SIZE: usize = 16;

/// One still-pending slice of an `add`ed batch. The batch itself lives in an
/// `Arc<Vec<C>>` so every predicate has a stable address for the lifetime of
/// the batch-series, without resorting to raw pointers: workers just clone
/// the `Arc` and index into it.
struct Chunk<C: Check> {
    batch: Arc<Vec<C>>,
    start: usize,
    end: usize,
}

struct Inner<C: Check> {
    queue: VecDeque<Chunk<C>>,
}

impl<C: Check> Inner<C> {
    fn push(&mut self, batch: Vec<C>) {
        if batch.is_empty() {
            return;
        }
        let end = batch.len();
        self.queue.push_back(Chunk {
            batch: Arc::new(batch),
            start: 0,
            end,
        });
    }

    fn take(&mut self) -> Option<Chunk<C>> {
        let front = self.queue.front_mut()?;
        let start = front.start;
        let end = (start + CHUNK_SIZE).min(front.end);
        front.start = end;
        let batch = Arc::clone(&front.batch);
        if front.start >= front.end {
            self.queue.pop_front();
        }
        Some(Chunk { batch, start, end })
    }
}

/// Master/worker pool. `C` is the predicate type; `ParallelCheckQueue<C>` is
/// shared between the caller (which `add`s and `wait`s) and the worker
/// threads (which call [`ParallelCheckQueue::worker_loop`]) through an `Arc`.
pub struct ParallelCheckQueue<C: Check> {
    inner: Mutex<Inner<C>>,
    condvar: Condvar,
    all_ok: AtomicBool,
    all_added: AtomicBool,
    new_block: AtomicBool,
    done: Vec<AtomicBool>,
}

impl<C: Check + Send + 'static> ParallelCheckQueue<C> {
    /// `worker_count` is the number of worker threads that will call
    /// `worker_loop` (not counting the master, which occupies slot 0).
    pub fn new(worker_count: usize) -> Arc<Self> {
        assert!(
            worker_count + 1 <= MAX_SLOTS,
            "check queue supports at most {} participating slots (master + workers), got {}",
            MAX_SLOTS,
            worker_count + 1
        );
        let done = (0..MAX_SLOTS)
            .map(|slot| AtomicBool::new(slot > worker_count))
            .collect();
        Arc::new(ParallelCheckQueue {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
            }),
            condvar: Condvar::new(),
            all_ok: AtomicBool::new(true),
            all_added: AtomicBool::new(false),
            new_block: AtomicBool::new(true),
            done,
        })
    }

    /// Spawn `worker_count` OS threads, each running [`Self::worker_loop`]
    /// for the lifetime of the process. Convenience wrapper; callers that
    /// want their own thread naming/affinity can call `worker_loop` directly.
    pub fn spawn_workers(self: &Arc<Self>, worker_count: usize) -> Vec<thread::JoinHandle<()>> {
        (1..=worker_count)
            .map(|id| {
                let queue = Arc::clone(self);
                thread::Builder::new()
                    .name(format!("check-worker-{}", id))
                    .spawn(move || queue.worker_loop(id))
                    .expect("failed to spawn check queue worker")
            })
            .collect()
    }

    /// Caller transfers ownership of a batch of predicates into the queue.
    /// May be called multiple times between scope creation and `wait`; every
    /// predicate submitted this way is attempted (or deliberately skipped,
    /// once `all_ok` has gone false) before the matching `wait` returns.
    pub fn add(&self, batch: Vec<C>) {
        if batch.is_empty() {
            return;
        }
        self.new_block.store(false, Ordering::SeqCst);
        {
            let mut inner = self.inner.lock();
            inner.push(batch);
        }
        self.condvar.notify_all();
    }

    /// Ends the current batch-series: tells workers no more work is coming,
    /// then joins them as the master (slot 0) until every submitted
    /// predicate has been attempted or skipped. Returns whether all
    /// predicates evaluated true. Resets `all_ok`, `done[*]`, and
    /// `new_block` before returning, ready for the next batch-series.
    pub fn wait(&self) -> bool {
        self.all_added.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
        let result = self.run_master();
        trace!("check queue batch-series finished, all_ok={}", result);
        result
    }

    /// Thread body for a permanent worker. Never returns; loops across
    /// batch-series for the lifetime of the process. Mirrors `run_master`
    /// except that an empty queue means sleeping (once the master has set
    /// `all_added`) or yielding (while more `add`s are still expected),
    /// rather than busy-polling for termination.
    pub fn worker_loop(&self, id: usize) {
        loop {
            let chunk = loop {
                let mut inner = self.inner.lock();
                if let Some(chunk) = inner.take() {
                    break chunk;
                }
                if self.all_added.load(Ordering::SeqCst) {
                    self.done[id].store(true, Ordering::SeqCst);
                    self.condvar.wait(&mut inner);
                    continue;
                }
                drop(inner);
                thread::yield_now();
            };
            self.evaluate(chunk);
        }
    }

    fn run_master(&self) -> bool {
        loop {
            let chunk = {
                let mut inner = self.inner.lock();
                inner.take()
            };
            match chunk {
                Some(chunk) => self.evaluate(chunk),
                None => break,
            }
        }
        self.done[0].store(true, Ordering::SeqCst);
        while !self.done.iter().all(|d| d.load(Ordering::SeqCst)) {
            std::hint::spin_loop();
        }
        let result = self.all_ok.load(Ordering::SeqCst);
        self.all_ok.store(true, Ordering::SeqCst);
        for d in &self.done {
            d.store(false, Ordering::SeqCst);
        }
        self.all_added.store(false, Ordering::SeqCst);
        self.new_block.store(true, Ordering::SeqCst);
        result
    }

    fn evaluate(&self, chunk: Chunk<C>) {
        if !self.all_ok.load(Ordering::SeqCst) {
            // Already failed; these predicates are deliberately skipped.
            return;
        }
        let mut ok = true;
        for item in &chunk.batch[chunk.start..chunk.end] {
            let result = panic::catch_unwind(AssertUnwindSafe(|| item.check())).unwrap_or(false);
            ok &= result;
        }
        if !ok {
            self.all_ok.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::QueueScope;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct AlwaysTrue;

    impl Check for AlwaysTrue {
        fn check(&self) -> bool {
            true
        }
    }

    struct CountingCheck {
        calls: Arc<AtomicUsize>,
        result: bool,
    }

    impl Check for CountingCheck {
        fn check(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }
    }

    fn spawned(worker_count: usize) -> Arc<ParallelCheckQueue<CountingCheck>> {
        let queue = ParallelCheckQueue::new(worker_count);
        let handles = queue.spawn_workers(worker_count);
        for h in handles {
            std::mem::forget(h); // worker threads run for process lifetime
        }
        queue
    }

    #[test]
    fn all_true_succeeds() {
        let queue: Arc<ParallelCheckQueue<AlwaysTrue>> = ParallelCheckQueue::new(4);
        for h in queue.spawn_workers(4) {
            std::mem::forget(h);
        }
        let mut scope = QueueScope::new(Arc::clone(&queue));
        scope.add((0..1000).map(|_| AlwaysTrue).collect());
        assert!(scope.wait());
    }

    #[test]
    fn short_circuit_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = spawned(4);
        let mut batch = Vec::new();
        for i in 0..1000 {
            batch.push(CountingCheck {
                calls: Arc::clone(&calls),
                result: i != 500,
            });
        }
        let mut scope = QueueScope::new(Arc::clone(&queue));
        scope.add(batch);
        let ok = scope.wait();
        assert!(!ok);
        // post-reset state: all_ok true again, every slot reset.
        assert!(queue.all_ok.load(Ordering::SeqCst));
        assert!(queue.done.iter().all(|d| !d.load(Ordering::SeqCst)));
    }

    #[test]
    fn drop_without_wait_still_evaluates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = spawned(2);
        {
            let mut scope = QueueScope::new(Arc::clone(&queue));
            let batch: Vec<_> = (0..200)
                .map(|_| CountingCheck {
                    calls: Arc::clone(&calls),
                    result: true,
                })
                .collect();
            scope.add(batch);
            // scope drops here without calling wait()
        }
        assert_eq!(calls.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn wait_returns_true_on_empty_scope() {
        let queue: Arc<ParallelCheckQueue<AlwaysTrue>> = spawned_empty();
        let scope = QueueScope::new(Arc::clone(&queue));
        assert!(scope.wait());

        fn spawned_empty() -> Arc<ParallelCheckQueue<AlwaysTrue>> {
            let queue = ParallelCheckQueue::new(2);
            for h in queue.spawn_workers(2) {
                std::mem::forget(h);
            }
            queue
        }
    }

    #[test]
    fn repeated_batch_series_on_same_queue() {
        let queue = spawned(3);
        for round in 0..5 {
            let calls = Arc::new(AtomicUsize::new(0));
            let batch: Vec<_> = (0..64)
                .map(|i| CountingCheck {
                    calls: Arc::clone(&calls),
                    result: !(round == 2 && i == 10),
                })
                .collect();
            let mut scope = QueueScope::new(Arc::clone(&queue));
            scope.add(batch);
            let ok = scope.wait();
            assert_eq!(ok, round != 2);
        }
    }

    #[test]
    fn worker_count_exceeding_slots_panics() {
        let result = std::panic::catch_unwind(|| {
            let _queue: Arc<ParallelCheckQueue<AlwaysTrue>> = ParallelCheckQueue::new(MAX_SLOTS);
        });
        assert!(result.is_err());
        // give any half-spawned state a moment before the process continues
        // running other tests.
        std::thread::sleep(Duration::from_millis(1));
    }
}
