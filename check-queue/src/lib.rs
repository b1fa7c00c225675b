//! A master/worker coordination primitive that runs a batch of independent
//! boolean predicates across a fixed pool of worker threads, short-circuiting
//! as soon as any predicate fails.
//!
//! Workers are spawned once by the caller and live for the process's
//! lifetime, each running [`ParallelCheckQueue::worker_loop`] forever. The
//! thread that calls [`ParallelCheckQueue::wait`] temporarily becomes the
//! master and participates in evaluation itself (slot 0) until every
//! predicate submitted since the last `wait` has been attempted or skipped.

mod check;
mod queue;
mod scope;

pub use check::Check;
pub use queue::{ParallelCheckQueue, MAX_SLOTS};
pub use scope::QueueScope;
