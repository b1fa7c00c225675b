use std::sync::Arc;

use crate::check::Check;
use crate::queue::ParallelCheckQueue;

/// Binds a batch-series to a lexical scope: no batch submitted through a
/// `QueueScope` outlives the scope it was submitted in, because dropping the
/// scope without an explicit [`QueueScope::wait`] calls `wait` for you.
pub struct QueueScope<C: Check> {
    queue: Arc<ParallelCheckQueue<C>>,
    waited: bool,
}

impl<C: Check + Send + 'static> QueueScope<C> {
    pub fn new(queue: Arc<ParallelCheckQueue<C>>) -> Self {
        QueueScope {
            queue,
            waited: false,
        }
    }

    /// Forwards to [`ParallelCheckQueue::add`].
    pub fn add(&mut self, batch: Vec<C>) {
        self.queue.add(batch);
    }

    /// Ends the batch-series and returns whether every predicate submitted
    /// through this scope evaluated true. Consumes the scope, so it is not
    /// possible to call `wait` twice or `add` after `wait` through the same
    /// `QueueScope` value.
    pub fn wait(mut self) -> bool {
        self.waited = true;
        self.queue.wait()
    }
}

impl<C: Check + Send + 'static> Drop for QueueScope<C> {
    fn drop(&mut self) {
        if !self.waited {
            self.waited = true;
            self.queue.wait();
        }
    }
}
